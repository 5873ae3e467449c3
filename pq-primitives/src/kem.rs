use std::fmt::Debug;
use std::marker::PhantomData;

use itertools::Itertools;
use log::{debug, trace};
use rand::{thread_rng, CryptoRng, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::{
    encoding::{
        bits_to_bytes, bytes_to_bits, expect_length, pack_polynomials, packed_len,
        unpack_polynomials,
    },
    error::{ensure_dimension, PqError, Result},
    field::Modulus,
    hash::{
        expand_polynomial, split_seed, Sha3, SymmetricPrimitive, DOMAIN_COINS, DOMAIN_KDF,
        DOMAIN_MATRIX, DOMAIN_SEED_SPLIT, HASH_BYTES,
    },
    matrix::Matrix,
    polynomial::Polynomial,
    ring::ModularRing,
    sampler::{NoiseDistribution, NoiseSampler},
};

/// Parameters of the module-lattice KEM over R_q = Z_q[X] / <X^n + 1>.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KemParameters {
    pub(crate) ring: ModularRing,
    /// Module rank k: A is k x k over R_q.
    pub(crate) rank: usize,
    /// Noise width of s, e and r.
    pub(crate) eta1: u32,
    /// Noise width of e1 and e2.
    pub(crate) eta2: u32,
}

impl KemParameters {
    /// n = 64: an 8-byte encapsulated seed. Fast enough for exhaustive tests.
    pub const TOY: KemParameters = KemParameters {
        ring: ModularRing::new_unchecked(Modulus::new_unchecked(3329), 64),
        rank: 2,
        eta1: 2,
        eta2: 2,
    };

    /// Kyber-512 shaped: n = 256, q = 3329, k = 2, without compression.
    pub const STANDARD: KemParameters = KemParameters {
        ring: ModularRing::new_unchecked(Modulus::new_unchecked(3329), 256),
        rank: 2,
        eta1: 2,
        eta2: 2,
    };

    pub fn new(q: u32, n: usize, rank: usize, eta1: u32, eta2: u32) -> Result<Self> {
        let parameters = KemParameters {
            ring: ModularRing::new(Modulus::new(q)?, n)?,
            rank,
            eta1,
            eta2,
        };
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rank == 0 || self.rank > u8::MAX as usize {
            return Err(PqError::InvalidParameters("module rank must lie in [1, 255]"));
        }
        if self.ring.degree() < 8 {
            return Err(PqError::InvalidParameters("ring degree must be at least 8"));
        }
        if self.ring.modulus().value() < 4 {
            return Err(PqError::InvalidParameters("KEM modulus must be at least 4"));
        }
        self.primary_noise().validate()?;
        self.secondary_noise().validate()
    }

    pub fn ring(&self) -> &ModularRing {
        &self.ring
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Bytes of encapsulated seed: one bit per coefficient of v.
    pub fn message_len(&self) -> usize {
        self.ring.degree() / 8
    }

    pub fn public_key_len(&self) -> usize {
        packed_len(
            self.rank * self.ring.degree(),
            self.ring.modulus().bit_width(),
        ) + HASH_BYTES
    }

    pub fn ciphertext_len(&self) -> usize {
        packed_len(
            (self.rank + 1) * self.ring.degree(),
            self.ring.modulus().bit_width(),
        )
    }

    fn primary_noise(&self) -> NoiseDistribution {
        NoiseDistribution::CenteredBinomial { eta: self.eta1 }
    }

    fn secondary_noise(&self) -> NoiseDistribution {
        NoiseDistribution::CenteredBinomial { eta: self.eta2 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    t: Vec<Polynomial>,
    /// Seed that A expands from.
    rho: [u8; HASH_BYTES],
    parameters: KemParameters,
}

impl PublicKey {
    pub fn parameters(&self) -> &KemParameters {
        &self.parameters
    }

    /// Serialize as the coefficients of t followed by rho.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = pack_polynomials(&self.t, self.parameters.ring.modulus());
        bytes.extend_from_slice(&self.rho);
        bytes
    }

    pub fn from_bytes(bytes: &[u8], parameters: &KemParameters) -> Result<Self> {
        expect_length(bytes, parameters.public_key_len())?;
        let split = bytes.len() - HASH_BYTES;
        let t = unpack_polynomials(
            &bytes[..split],
            parameters.rank,
            parameters.ring.degree(),
            parameters.ring.modulus(),
        );
        let mut rho = [0u8; HASH_BYTES];
        rho.copy_from_slice(&bytes[split..]);
        Ok(PublicKey {
            t,
            rho,
            parameters: *parameters,
        })
    }

    /// Short hex digest of the serialized key, for display.
    pub fn fingerprint(&self) -> String {
        hex::encode(&Sha3::hash(&[self.to_bytes().as_slice()])[..8])
    }
}

/// Decapsulation key. Keeps its public key so that decapsulation can
/// re-encrypt, and the rejection seed `z` for the decoy secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    s: Vec<Polynomial>,
    public_key: PublicKey,
    public_key_hash: [u8; HASH_BYTES],
    z: [u8; HASH_BYTES],
}

impl SecretKey {
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    u: Vec<Polynomial>,
    v: Polynomial,
}

impl Ciphertext {
    /// Serialize as the coefficients of u followed by those of v.
    pub fn to_bytes(&self) -> Vec<u8> {
        let polynomials = self
            .u
            .iter()
            .chain(std::iter::once(&self.v))
            .cloned()
            .collect_vec();
        pack_polynomials(&polynomials, self.v.modulus())
    }

    /// Any byte string of the right length decodes: coefficients that do not
    /// fit below q are reduced.
    pub fn from_bytes(bytes: &[u8], parameters: &KemParameters) -> Result<Self> {
        expect_length(bytes, parameters.ciphertext_len())?;
        let mut u = unpack_polynomials(
            bytes,
            parameters.rank + 1,
            parameters.ring.degree(),
            parameters.ring.modulus(),
        );
        let v = u
            .pop()
            .ok_or(PqError::DimensionMismatch {
                expected: parameters.rank + 1,
                found: 0,
            })?;
        Ok(Ciphertext { u, v })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharedSecret([u8; HASH_BYTES]);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; HASH_BYTES] {
        &self.0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        expect_length(bytes, HASH_BYTES)?;
        let mut secret = [0u8; HASH_BYTES];
        secret.copy_from_slice(bytes);
        Ok(SharedSecret(secret))
    }
}

impl Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("SharedSecret({})", hex::encode(self.0)))
    }
}

/// Simplified Kyber: module-LWE public-key encryption of a random seed,
/// wrapped in a Fujisaki–Okamoto transform with implicit rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatticeKem<H: SymmetricPrimitive = Sha3> {
    parameters: KemParameters,
    _hash: PhantomData<H>,
}

impl<H: SymmetricPrimitive> LatticeKem<H> {
    pub fn new(parameters: KemParameters) -> Result<Self> {
        parameters.validate()?;
        Ok(Self {
            parameters,
            _hash: PhantomData,
        })
    }

    pub fn parameters(&self) -> &KemParameters {
        &self.parameters
    }

    /// Generate a key pair using randomness supplied by the operating system.
    pub fn generate(&self) -> Result<(SecretKey, PublicKey)> {
        self.keygen(&mut thread_rng())
    }

    /// Generate a key pair pseudorandomly by expanding a given seed.
    pub fn keygen_from_seed(&self, seed: [u8; 32]) -> Result<(SecretKey, PublicKey)> {
        self.keygen(&mut ChaCha20Rng::from_seed(seed))
    }

    /// (rho, sigma) = G(d); A = Expand(rho); s, e from PRF(sigma, ·);
    /// t = A·s + e.
    pub fn keygen<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<(SecretKey, PublicKey)> {
        let ring = self.parameters.ring;
        let k = self.parameters.rank;
        debug!(
            "KEM keygen: n = {}, q = {}, k = {}",
            ring.degree(),
            ring.modulus(),
            k
        );

        let d: [u8; HASH_BYTES] = rng.gen();
        let z: [u8; HASH_BYTES] = rng.gen();
        let (rho, sigma) = split_seed::<H>(DOMAIN_SEED_SPLIT, &[&d]);

        let a = self.expand_matrix(&rho);
        let s = NoiseSampler::derived::<H>(self.parameters.primary_noise(), &sigma, 0)?
            .sample_vector(&ring, k);
        let e = NoiseSampler::derived::<H>(self.parameters.primary_noise(), &sigma, 1)?
            .sample_vector(&ring, k);
        let t = ring.add_vectors(&ring.matrix_vector(&a, &s)?, &e)?;

        let public_key = PublicKey {
            t,
            rho,
            parameters: self.parameters,
        };
        let public_key_hash = H::hash(&[public_key.to_bytes().as_slice()]);
        let secret_key = SecretKey {
            s,
            public_key: public_key.clone(),
            public_key_hash,
            z,
        };
        Ok((secret_key, public_key))
    }

    /// Encapsulate a fresh shared secret to the holder of `pk`.
    pub fn encapsulate<R: RngCore + CryptoRng>(
        &self,
        pk: &PublicKey,
        rng: &mut R,
    ) -> Result<(Ciphertext, SharedSecret)> {
        let mut message = vec![0u8; self.parameters.message_len()];
        rng.fill_bytes(&mut message);
        self.encapsulate_message(pk, &message)
    }

    /// Deterministic half of encapsulation: everything downstream of the
    /// random message.
    pub(crate) fn encapsulate_message(
        &self,
        pk: &PublicKey,
        message: &[u8],
    ) -> Result<(Ciphertext, SharedSecret)> {
        let public_key_hash = H::hash(&[pk.to_bytes().as_slice()]);
        let (key_seed, coins) = split_seed::<H>(DOMAIN_COINS, &[message, &public_key_hash]);
        let ciphertext = self.encrypt(pk, message, &coins)?;
        let shared_secret = Self::derive_secret(&key_seed, &ciphertext);
        debug!("KEM encapsulate to {}", pk.fingerprint());
        Ok((ciphertext, shared_secret))
    }

    /// Recover the shared secret. A ciphertext that does not re-encrypt to
    /// itself yields a pseudorandom decoy derived from `z`, never an error;
    /// only malformed shapes are rejected.
    pub fn decapsulate(&self, sk: &SecretKey, ciphertext: &Ciphertext) -> Result<SharedSecret> {
        let message = self.decrypt(&sk.s, ciphertext)?;
        let (key_seed, coins) =
            split_seed::<H>(DOMAIN_COINS, &[&message, &sk.public_key_hash]);
        let reencrypted = self.encrypt(&sk.public_key, &message, &coins)?;
        if reencrypted == *ciphertext {
            Ok(Self::derive_secret(&key_seed, ciphertext))
        } else {
            trace!("KEM decapsulate: re-encryption mismatch, implicit rejection");
            Ok(Self::derive_secret(&sk.z, ciphertext))
        }
    }

    fn expand_matrix(&self, rho: &[u8; HASH_BYTES]) -> Matrix<Polynomial> {
        let ring = self.parameters.ring;
        let k = self.parameters.rank;
        Matrix::from_fn(k, k, |i, j| {
            expand_polynomial::<H>(
                &[DOMAIN_MATRIX, rho, &[i as u8, j as u8]],
                ring.degree(),
                ring.modulus(),
            )
        })
    }

    /// u = Aᵀ·r + e1, v = tᵀ·r + e2 + Encode(message), all randomness
    /// derived from `coins`.
    fn encrypt(
        &self,
        pk: &PublicKey,
        message: &[u8],
        coins: &[u8; HASH_BYTES],
    ) -> Result<Ciphertext> {
        let ring = self.parameters.ring;
        let k = self.parameters.rank;
        ensure_dimension(self.parameters.message_len(), message.len())?;
        ensure_dimension(k, pk.t.len())?;

        let a = self.expand_matrix(&pk.rho);
        let r = NoiseSampler::derived::<H>(self.parameters.primary_noise(), coins, 0)?
            .sample_vector(&ring, k);
        let e1 = NoiseSampler::derived::<H>(self.parameters.secondary_noise(), coins, 1)?
            .sample_vector(&ring, k);
        let e2 = NoiseSampler::derived::<H>(self.parameters.secondary_noise(), coins, 2)?
            .sample(&ring);

        let u = ring.add_vectors(&ring.matrix_transpose_vector(&a, &r)?, &e1)?;
        let v = ring.add(
            &ring.add(&ring.inner_product(&pk.t, &r)?, &e2)?,
            &self.encode_message(message),
        )?;
        Ok(Ciphertext { u, v })
    }

    /// Decode v - sᵀ·u coefficientwise back to message bits.
    fn decrypt(&self, s: &[Polynomial], ciphertext: &Ciphertext) -> Result<Vec<u8>> {
        let ring = self.parameters.ring;
        ensure_dimension(self.parameters.rank, ciphertext.u.len())?;
        let w = ring.sub(&ciphertext.v, &ring.inner_product(s, &ciphertext.u)?)?;
        let modulus = ring.modulus();
        let bits = w
            .coefficients()
            .iter()
            .map(|&c| modulus.decode_bit(c))
            .collect_vec();
        Ok(bits_to_bytes(&bits))
    }

    fn encode_message(&self, message: &[u8]) -> Polynomial {
        let modulus = self.parameters.ring.modulus();
        Polynomial::new(
            bytes_to_bits(message)
                .into_iter()
                .map(|bit| modulus.half() * (bit as u32))
                .collect_vec(),
            modulus,
        )
    }

    fn derive_secret(key_seed: &[u8; HASH_BYTES], ciphertext: &Ciphertext) -> SharedSecret {
        let ciphertext_hash = H::hash(&[ciphertext.to_bytes().as_slice()]);
        SharedSecret(H::hash(&[DOMAIN_KDF, key_seed, &ciphertext_hash]))
    }
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, thread_rng, Rng, RngCore, SeedableRng};

    use crate::error::PqError;
    use crate::hash::Sha3;
    use crate::kem::{Ciphertext, KemParameters, LatticeKem, PublicKey, SharedSecret};

    #[test]
    fn test_toy_encapsulation_agrees() {
        let seed: [u8; 32] = thread_rng().gen();
        println!("seed: {:2?}", seed);
        let mut rng: StdRng = SeedableRng::from_seed(seed);
        let kem = LatticeKem::<Sha3>::new(KemParameters::TOY).unwrap();
        for _ in 0..10 {
            let (sk, pk) = kem.keygen_from_seed(rng.gen()).unwrap();
            for _ in 0..20 {
                let (ciphertext, shared_secret) = kem
                    .encapsulate(&pk, &mut rand_chacha::ChaCha20Rng::from_seed(rng.gen()))
                    .unwrap();
                assert_eq!(kem.decapsulate(&sk, &ciphertext).unwrap(), shared_secret);
            }
        }
    }

    #[test]
    fn test_standard_encapsulation_agrees() {
        let mut rng = thread_rng();
        let kem = LatticeKem::<Sha3>::new(KemParameters::STANDARD).unwrap();
        let (sk, pk) = kem.keygen(&mut rng).unwrap();
        for _ in 0..5 {
            let (ciphertext, shared_secret) = kem.encapsulate(&pk, &mut rng).unwrap();
            assert_eq!(kem.decapsulate(&sk, &ciphertext).unwrap(), shared_secret);
        }
    }

    #[test]
    fn test_decryption_noise_margin() {
        let mut rng = thread_rng();
        let parameters = KemParameters::TOY;
        let ring = parameters.ring;
        let kem = LatticeKem::<Sha3>::new(parameters).unwrap();
        let (sk, pk) = kem.keygen(&mut rng).unwrap();
        let mut message = vec![0u8; parameters.message_len()];
        rng.fill_bytes(&mut message);
        let coins: [u8; 32] = rng.gen();
        let ciphertext = kem.encrypt(&pk, &message, &coins).unwrap();
        let w = ring
            .sub(
                &ciphertext.v,
                &ring.inner_product(&sk.s, &ciphertext.u).unwrap(),
            )
            .unwrap();
        let noise = ring.sub(&w, &kem.encode_message(&message)).unwrap();
        assert!(4 * noise.infinity_norm() < 3329, "noise {}", noise.infinity_norm());
        assert_eq!(kem.decrypt(&sk.s, &ciphertext).unwrap(), message);
    }

    #[test]
    fn test_single_byte_mutation_diverges() {
        let mut rng = thread_rng();
        let parameters = KemParameters::TOY;
        let kem = LatticeKem::<Sha3>::new(parameters).unwrap();
        let (sk, pk) = kem.keygen(&mut rng).unwrap();
        let (ciphertext, shared_secret) = kem.encapsulate(&pk, &mut rng).unwrap();
        let serialized = ciphertext.to_bytes();
        assert_eq!(serialized.len(), parameters.ciphertext_len());

        for position in 0..serialized.len() {
            let mut mutated = serialized.clone();
            mutated[position] ^= rng.gen_range(1..=255u8);
            let tampered = Ciphertext::from_bytes(&mutated, &parameters).unwrap();
            assert_ne!(tampered, ciphertext, "position {position}");
            let decoy = kem.decapsulate(&sk, &tampered).unwrap();
            assert_ne!(decoy, shared_secret, "position {position}");
        }
    }

    #[test]
    fn test_implicit_rejection_is_deterministic() {
        let kem = LatticeKem::<Sha3>::new(KemParameters::TOY).unwrap();
        let (sk, pk) = kem.generate().unwrap();
        let (other_sk, _) = kem.generate().unwrap();
        let (ciphertext, shared_secret) = kem.encapsulate(&pk, &mut thread_rng()).unwrap();

        let decoy = kem.decapsulate(&other_sk, &ciphertext).unwrap();
        assert_ne!(decoy, shared_secret);
        assert_eq!(kem.decapsulate(&other_sk, &ciphertext).unwrap(), decoy);
        assert_eq!(kem.decapsulate(&sk, &ciphertext).unwrap(), shared_secret);
    }

    #[test]
    fn test_encapsulation_is_deterministic_in_message() {
        let kem = LatticeKem::<Sha3>::new(KemParameters::TOY).unwrap();
        let (_, pk) = kem.generate().unwrap();
        let message = [9u8; 8];
        let (c0, k0) = kem.encapsulate_message(&pk, &message).unwrap();
        let (c1, k1) = kem.encapsulate_message(&pk, &message).unwrap();
        assert_eq!(c0, c1);
        assert_eq!(k0, k1);
        assert!(kem.encapsulate_message(&pk, &[0u8; 7]).is_err());
    }

    #[test]
    fn test_same_seed_same_keys() {
        let kem = LatticeKem::<Sha3>::new(KemParameters::STANDARD).unwrap();
        let seed: [u8; 32] = thread_rng().gen();
        let (sk0, pk0) = kem.keygen_from_seed(seed).unwrap();
        let (sk1, pk1) = kem.keygen_from_seed(seed).unwrap();
        assert_eq!(pk0.to_bytes(), pk1.to_bytes());
        assert_eq!(sk0, sk1);

        let (_, pk2) = kem.keygen_from_seed(thread_rng().gen()).unwrap();
        assert_ne!(pk0.to_bytes(), pk2.to_bytes());
    }

    #[test]
    fn test_public_key_serialization() {
        let parameters = KemParameters::STANDARD;
        let kem = LatticeKem::<Sha3>::new(parameters).unwrap();
        let (sk, pk) = kem.generate().unwrap();
        let serialized = pk.to_bytes();
        // 2 * 256 coefficients of 12 bits, then rho
        assert_eq!(serialized.len(), 768 + 32);
        let deserialized = PublicKey::from_bytes(&serialized, &parameters).unwrap();
        assert_eq!(pk, deserialized);
        assert_eq!(&deserialized, sk.public_key());

        // a sender holding only the bytes encapsulates to the same key
        let (ciphertext, shared_secret) = kem.encapsulate(&deserialized, &mut thread_rng()).unwrap();
        assert_eq!(kem.decapsulate(&sk, &ciphertext).unwrap(), shared_secret);

        assert!(PublicKey::from_bytes(&serialized[1..], &parameters).is_err());
    }

    #[test]
    fn test_ciphertext_and_secret_serialization() {
        let parameters = KemParameters::TOY;
        let kem = LatticeKem::<Sha3>::new(parameters).unwrap();
        let (sk, pk) = kem.generate().unwrap();
        let (ciphertext, shared_secret) = kem.encapsulate(&pk, &mut thread_rng()).unwrap();

        let deserialized = Ciphertext::from_bytes(&ciphertext.to_bytes(), &parameters).unwrap();
        assert_eq!(deserialized, ciphertext);
        assert_eq!(kem.decapsulate(&sk, &deserialized).unwrap(), shared_secret);

        let secret_bytes = shared_secret.to_bytes();
        assert_eq!(SharedSecret::from_bytes(&secret_bytes).unwrap(), shared_secret);
        assert!(SharedSecret::from_bytes(&secret_bytes[..31]).is_err());
        assert!(Ciphertext::from_bytes(&[0u8; 3], &parameters).is_err());
    }

    #[test]
    fn test_mismatched_shapes_are_errors() {
        let toy = LatticeKem::<Sha3>::new(KemParameters::TOY).unwrap();
        let standard = LatticeKem::<Sha3>::new(KemParameters::STANDARD).unwrap();
        let (toy_sk, _) = toy.generate().unwrap();
        let (_, standard_pk) = standard.generate().unwrap();
        let (ciphertext, _) = standard.encapsulate(&standard_pk, &mut thread_rng()).unwrap();
        assert!(matches!(
            toy.decapsulate(&toy_sk, &ciphertext),
            Err(PqError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_public_key_is_a_short_distance_from_a_times_s() {
        let kem = LatticeKem::<Sha3>::new(KemParameters::TOY).unwrap();
        let ring = KemParameters::TOY.ring;
        for _ in 0..10 {
            let (sk, pk) = kem.keygen_from_seed(thread_rng().gen()).unwrap();
            let a = kem.expand_matrix(&pk.rho);
            let a_s = ring.matrix_vector(&a, &sk.s).unwrap();
            for (t_i, a_s_i) in pk.t.iter().zip(a_s.iter()) {
                let e_i = ring.sub(t_i, a_s_i).unwrap();
                assert!(e_i.infinity_norm() <= KemParameters::TOY.eta1 as u64);
            }
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(KemParameters::new(3329, 48, 2, 2, 2).is_err());
        assert!(KemParameters::new(3329, 64, 0, 2, 2).is_err());
        assert!(KemParameters::new(3329, 64, 3, 2, 2).is_ok());
        assert!(matches!(
            KemParameters::new(3329, 64, 2, 33, 2),
            Err(PqError::InvalidParameters(_))
        ));
        assert!(KemParameters::new(3329, 64, 2, 2, 64).is_err());
        assert!(KemParameters::new(3329, 64, 2, 32, 32).is_ok());
    }
}
