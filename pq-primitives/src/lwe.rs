use itertools::Itertools;
use log::debug;
use rand::{thread_rng, CryptoRng, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::{
    encoding::{
        bits_to_bytes, bytes_to_bits, expect_length, pack_residues, packed_len, unpack_residues,
    },
    error::{ensure_dimension, PqError, Result},
    field::Modulus,
    hash::{Sha3, SymmetricPrimitive},
    matrix::{inner_product, Matrix},
    sampler::{NoiseDistribution, NoiseSampler},
};

/// Parameters of plain (Regev) LWE encryption.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LweParameters {
    pub(crate) modulus: Modulus,
    /// Secret dimension n.
    pub(crate) dimension: usize,
    /// Number of LWE samples m, i.e. rows of A.
    pub(crate) samples: usize,
    pub(crate) noise: NoiseDistribution,
}

impl LweParameters {
    /// q = 97, n = 4, m = 8, noise uniform on {-1, 0, 1}. The worst-case
    /// decryption noise is 8 < q/4, so decryption never fails.
    pub const TOY: LweParameters = LweParameters {
        modulus: Modulus::new_unchecked(97),
        dimension: 4,
        samples: 8,
        noise: NoiseDistribution::Uniform { bound: 1 },
    };

    pub const DEMO: LweParameters = LweParameters {
        modulus: Modulus::new_unchecked(3329),
        dimension: 64,
        samples: 128,
        noise: NoiseDistribution::CenteredBinomial { eta: 2 },
    };

    pub fn new(q: u32, dimension: usize, samples: usize, noise: NoiseDistribution) -> Result<Self> {
        let parameters = LweParameters {
            modulus: Modulus::new(q)?,
            dimension,
            samples,
            noise,
        };
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 || self.samples == 0 {
            return Err(PqError::InvalidParameters(
                "LWE dimension and sample count must be positive",
            ));
        }
        if self.modulus.value() < 4 {
            return Err(PqError::InvalidParameters("LWE modulus must be at least 4"));
        }
        self.noise.validate()
    }

    pub fn modulus(&self) -> Modulus {
        self.modulus
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn noise(&self) -> NoiseDistribution {
        self.noise
    }

    /// Largest possible |eᵀ·r| for binary r. While this stays below q/4 no
    /// ciphertext can decrypt wrongly.
    pub fn worst_case_noise(&self) -> u64 {
        self.samples as u64 * self.noise.bound() as u64
    }

    fn public_key_len(&self) -> usize {
        packed_len(
            self.samples * self.dimension + self.samples,
            self.modulus.bit_width(),
        )
    }

    fn ciphertext_len(&self) -> usize {
        packed_len(self.dimension + 1, self.modulus.bit_width())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    a: Matrix<u32>,
    b: Vec<u32>,
    parameters: LweParameters,
}

impl PublicKey {
    pub fn parameters(&self) -> &LweParameters {
        &self.parameters
    }

    /// Serialize as the entries of A in row-major order followed by b.
    pub fn to_bytes(&self) -> Vec<u8> {
        pack_residues(
            self.a.entries().iter().chain(self.b.iter()),
            self.parameters.modulus.bit_width(),
        )
    }

    pub fn from_bytes(bytes: &[u8], parameters: &LweParameters) -> Result<Self> {
        expect_length(bytes, parameters.public_key_len())?;
        let (m, n) = (parameters.samples, parameters.dimension);
        let mut residues = unpack_residues(bytes, m * n + m, parameters.modulus);
        let b = residues.split_off(m * n);
        Ok(PublicKey {
            a: Matrix::new(m, n, residues)?,
            b,
            parameters: *parameters,
        })
    }

    /// Short hex digest of the serialized key, for display.
    pub fn fingerprint(&self) -> String {
        hex::encode(&Sha3::hash(&[self.to_bytes().as_slice()])[..8])
    }
}

/// The secret vector s. Never serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    s: Vec<u32>,
    parameters: LweParameters,
}

impl SecretKey {
    pub fn parameters(&self) -> &LweParameters {
        &self.parameters
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    u: Vec<u32>,
    v: u32,
}

impl Ciphertext {
    /// Serialize as the entries of u followed by v.
    pub fn to_bytes(&self, parameters: &LweParameters) -> Vec<u8> {
        pack_residues(
            self.u.iter().chain(std::iter::once(&self.v)),
            parameters.modulus.bit_width(),
        )
    }

    pub fn from_bytes(bytes: &[u8], parameters: &LweParameters) -> Result<Self> {
        expect_length(bytes, parameters.ciphertext_len())?;
        let mut u = unpack_residues(bytes, parameters.dimension + 1, parameters.modulus);
        let v = u.pop().unwrap_or_default();
        Ok(Ciphertext { u, v })
    }
}

/// Regev-style LWE public-key encryption of single bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LweScheme {
    parameters: LweParameters,
}

impl LweScheme {
    pub fn new(parameters: LweParameters) -> Result<Self> {
        parameters.validate()?;
        Ok(Self { parameters })
    }

    pub fn parameters(&self) -> &LweParameters {
        &self.parameters
    }

    /// Generate a key pair using randomness supplied by the operating system.
    pub fn generate(&self) -> (SecretKey, PublicKey) {
        self.keygen(&mut thread_rng())
    }

    /// Generate a key pair pseudorandomly by expanding a given seed.
    pub fn keygen_from_seed(&self, seed: [u8; 32]) -> (SecretKey, PublicKey) {
        self.keygen(&mut ChaCha20Rng::from_seed(seed))
    }

    /// Draw A uniformly, sample small s and e, and publish b = A·s + e.
    pub fn keygen<R: RngCore + CryptoRng>(&self, rng: &mut R) -> (SecretKey, PublicKey) {
        let LweParameters {
            modulus,
            dimension,
            samples,
            noise,
        } = self.parameters;
        debug!("LWE keygen: q = {modulus}, n = {dimension}, m = {samples}");

        let a = Matrix::uniform(samples, dimension, modulus, rng);
        let mut sampler = NoiseSampler::from_seed_unchecked(noise, rng.gen());
        let s = sampler.sample_residues(dimension, modulus);
        let e = sampler.sample_residues(samples, modulus);

        let b = (0..samples)
            .map(|i| modulus.add(inner_product(a.row(i), &s, modulus), e[i]))
            .collect_vec();

        let sk = SecretKey {
            s,
            parameters: self.parameters,
        };
        let pk = PublicKey {
            a,
            b,
            parameters: self.parameters,
        };
        (sk, pk)
    }

    /// Encrypt one bit: u = Aᵀ·r and v = bᵀ·r + bit·⌊q/2⌋ for a fresh binary r.
    pub fn encrypt<R: RngCore + CryptoRng>(
        &self,
        pk: &PublicKey,
        bit: bool,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        self.check_public_key(pk)?;
        let modulus = self.parameters.modulus;
        let r = (0..self.parameters.samples)
            .map(|_| rng.gen::<bool>() as u32)
            .collect_vec();

        let u = pk.a.transpose_mul_vector(&r, modulus)?;
        let v = modulus.add(
            inner_product(&pk.b, &r, modulus),
            modulus.half() * (bit as u32),
        );
        Ok(Ciphertext { u, v })
    }

    /// Recover the bit from v - sᵀ·u. Accumulated noise beyond q/4 flips the
    /// result silently; that is a property of the parameters, not an error.
    pub fn decrypt(&self, sk: &SecretKey, ciphertext: &Ciphertext) -> Result<bool> {
        self.check_parameters(&sk.parameters)?;
        ensure_dimension(self.parameters.dimension, sk.s.len())?;
        ensure_dimension(self.parameters.dimension, ciphertext.u.len())?;
        let modulus = self.parameters.modulus;
        let d = modulus.sub(ciphertext.v, inner_product(&sk.s, &ciphertext.u, modulus));
        Ok(modulus.decode_bit(d))
    }

    /// Encrypt a byte string one bit at a time, least significant bit first.
    pub fn encrypt_bytes<R: RngCore + CryptoRng>(
        &self,
        pk: &PublicKey,
        message: &[u8],
        rng: &mut R,
    ) -> Result<Vec<Ciphertext>> {
        bytes_to_bits(message)
            .into_iter()
            .map(|bit| self.encrypt(pk, bit, rng))
            .collect()
    }

    pub fn decrypt_bytes(&self, sk: &SecretKey, ciphertexts: &[Ciphertext]) -> Result<Vec<u8>> {
        ensure_dimension(ciphertexts.len().div_ceil(8) * 8, ciphertexts.len())?;
        let bits = ciphertexts
            .iter()
            .map(|c| self.decrypt(sk, c))
            .collect::<Result<Vec<bool>>>()?;
        Ok(bits_to_bytes(&bits))
    }

    /// Keys only work under the parameters they were generated for.
    fn check_parameters(&self, parameters: &LweParameters) -> Result<()> {
        if parameters.modulus != self.parameters.modulus {
            return Err(PqError::ModulusMismatch {
                expected: self.parameters.modulus.value(),
                found: parameters.modulus.value(),
            });
        }
        if parameters != &self.parameters {
            return Err(PqError::InvalidParameters(
                "key belongs to a different LWE parameter set",
            ));
        }
        Ok(())
    }

    fn check_public_key(&self, pk: &PublicKey) -> Result<()> {
        self.check_parameters(&pk.parameters)?;
        ensure_dimension(self.parameters.samples, pk.a.rows())?;
        ensure_dimension(self.parameters.dimension, pk.a.cols())?;
        ensure_dimension(self.parameters.samples, pk.b.len())
    }
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, thread_rng, Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    use crate::error::{DeserializationError, PqError};
    use crate::lwe::{Ciphertext, LweParameters, LweScheme, PublicKey};
    use crate::sampler::NoiseDistribution;

    #[test]
    fn test_toy_parameters_decrypt_every_bit() {
        let seed: [u8; 32] = thread_rng().gen();
        println!("seed: {:2?}", seed);
        let mut rng = ChaCha20Rng::from_seed(seed);

        let scheme = LweScheme::new(LweParameters::TOY).unwrap();
        assert!(4 * LweParameters::TOY.worst_case_noise() < 97);

        // 100 keys x 100 encryptions
        let mut failures = 0;
        for _ in 0..100 {
            let (sk, pk) = scheme.keygen(&mut rng);
            for _ in 0..100 {
                let bit: bool = rng.gen();
                let ciphertext = scheme.encrypt(&pk, bit, &mut rng).unwrap();
                if scheme.decrypt(&sk, &ciphertext).unwrap() != bit {
                    failures += 1;
                }
            }
        }
        assert_eq!(failures, 0);
    }

    #[test]
    fn test_demo_parameters() {
        let mut rng = thread_rng();
        let scheme = LweScheme::new(LweParameters::DEMO).unwrap();
        let (sk, pk) = scheme.keygen(&mut rng);
        for _ in 0..200 {
            let bit: bool = rng.gen();
            let ciphertext = scheme.encrypt(&pk, bit, &mut rng).unwrap();
            assert_eq!(scheme.decrypt(&sk, &ciphertext).unwrap(), bit);
        }
    }

    #[test]
    fn test_same_seed_same_keys() {
        let scheme = LweScheme::new(LweParameters::DEMO).unwrap();
        let seed: [u8; 32] = thread_rng().gen();
        let (sk0, pk0) = scheme.keygen_from_seed(seed);
        let (sk1, pk1) = scheme.keygen_from_seed(seed);
        assert_eq!(pk0.to_bytes(), pk1.to_bytes());
        assert_eq!(sk0, sk1);

        let mut other = seed;
        other[0] ^= 1;
        let (_, pk2) = scheme.keygen_from_seed(other);
        assert_ne!(pk0.to_bytes(), pk2.to_bytes());
        assert_ne!(pk0.fingerprint(), pk2.fingerprint());
    }

    #[test]
    fn test_bytes_round_trip() {
        let mut rng: StdRng = SeedableRng::from_seed(thread_rng().gen());
        let scheme = LweScheme::new(LweParameters::TOY).unwrap();
        let (sk, pk) = scheme.keygen(&mut ChaCha20Rng::from_seed(rng.gen()));
        let message = b"Quantum-safe message!";
        let ciphertexts = scheme
            .encrypt_bytes(&pk, message, &mut ChaCha20Rng::from_seed(rng.gen()))
            .unwrap();
        assert_eq!(ciphertexts.len(), message.len() * 8);
        assert_eq!(scheme.decrypt_bytes(&sk, &ciphertexts).unwrap(), message);
        assert!(scheme.decrypt_bytes(&sk, &ciphertexts[1..]).is_err());
    }

    #[test]
    fn test_public_key_serialization() {
        let parameters = LweParameters::TOY;
        let scheme = LweScheme::new(parameters).unwrap();
        let (_, pk) = scheme.generate();
        let serialized = pk.to_bytes();
        // 8 * 4 + 8 residues of 7 bits
        assert_eq!(serialized.len(), 35);
        let deserialized = PublicKey::from_bytes(&serialized, &parameters).unwrap();
        assert_eq!(pk, deserialized);
        assert_eq!(serialized, deserialized.to_bytes());

        let longer = [serialized.clone(), vec![0u8]].concat();
        assert_eq!(
            PublicKey::from_bytes(&longer, &parameters),
            Err(PqError::Deserialization(
                DeserializationError::BadEncodingLength {
                    expected: 35,
                    found: 36
                }
            ))
        );
    }

    #[test]
    fn test_ciphertext_serialization() {
        let parameters = LweParameters::DEMO;
        let scheme = LweScheme::new(parameters).unwrap();
        let (sk, pk) = scheme.generate();
        let ciphertext = scheme.encrypt(&pk, true, &mut thread_rng()).unwrap();
        let serialized = ciphertext.to_bytes(&parameters);
        let deserialized = Ciphertext::from_bytes(&serialized, &parameters).unwrap();
        assert_eq!(ciphertext, deserialized);
        assert!(scheme.decrypt(&sk, &deserialized).unwrap());

        let shorter = &serialized[..serialized.len() - 1];
        assert!(Ciphertext::from_bytes(shorter, &parameters).is_err());
    }

    #[test]
    fn test_shifted_ciphertext_flips_silently() {
        let parameters = LweParameters::TOY;
        let scheme = LweScheme::new(parameters).unwrap();
        let (sk, pk) = scheme.generate();
        let mut ciphertext = scheme.encrypt(&pk, false, &mut thread_rng()).unwrap();
        ciphertext.v = parameters.modulus.add(ciphertext.v, parameters.modulus.half());
        assert_eq!(scheme.decrypt(&sk, &ciphertext), Ok(true));
    }

    #[test]
    fn test_dimension_mismatch() {
        let toy = LweScheme::new(LweParameters::TOY).unwrap();
        let demo = LweScheme::new(LweParameters::DEMO).unwrap();
        let (toy_sk, toy_pk) = toy.generate();
        let (_, demo_pk) = demo.generate();
        let ciphertext = demo.encrypt(&demo_pk, true, &mut thread_rng()).unwrap();
        assert_eq!(
            toy.decrypt(&toy_sk, &ciphertext),
            Err(PqError::DimensionMismatch {
                expected: 4,
                found: 64
            })
        );
        assert!(demo.encrypt(&toy_pk, true, &mut thread_rng()).is_err());
    }

    #[test]
    fn test_keys_from_another_modulus_are_rejected() {
        let mut rng = thread_rng();
        let toy = LweScheme::new(LweParameters::TOY).unwrap();
        let other_parameters =
            LweParameters::new(7919, 4, 8, NoiseDistribution::Uniform { bound: 1 }).unwrap();
        let other = LweScheme::new(other_parameters).unwrap();
        let (other_sk, other_pk) = other.keygen(&mut rng);
        let (toy_sk, toy_pk) = toy.keygen(&mut rng);

        // same shapes, different q
        assert_eq!(
            toy.encrypt(&other_pk, true, &mut rng),
            Err(PqError::ModulusMismatch {
                expected: 97,
                found: 7919
            })
        );
        let ciphertext = toy.encrypt(&toy_pk, true, &mut rng).unwrap();
        assert_eq!(
            toy.decrypt(&other_sk, &ciphertext),
            Err(PqError::ModulusMismatch {
                expected: 97,
                found: 7919
            })
        );
        assert!(toy.encrypt_bytes(&other_pk, b"hi", &mut rng).is_err());

        // same q and shapes, different noise
        let wider =
            LweParameters::new(97, 4, 8, NoiseDistribution::Uniform { bound: 2 }).unwrap();
        let (wider_sk, _) = LweScheme::new(wider).unwrap().keygen(&mut rng);
        assert!(matches!(
            toy.decrypt(&wider_sk, &ciphertext),
            Err(PqError::InvalidParameters(_))
        ));
        assert!(toy.decrypt(&toy_sk, &ciphertext).unwrap());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(LweParameters::new(97, 0, 8, NoiseDistribution::Uniform { bound: 1 }).is_err());
        assert!(LweParameters::new(3, 4, 8, NoiseDistribution::Uniform { bound: 1 }).is_err());
        assert!(LweParameters::new(97, 4, 8, NoiseDistribution::Uniform { bound: 1 }).is_ok());
    }
}
