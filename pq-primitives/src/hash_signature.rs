use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};

use itertools::Itertools;
use log::{debug, trace};
use rand::{thread_rng, CryptoRng, Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::{
    encoding::expect_length,
    error::{DeserializationError, PqError, Result},
    hash::{Sha3, SymmetricPrimitive, DOMAIN_MESSAGE, HASH_BYTES},
    merkle::{root_from_path, MerkleTree},
    wots::{leaf_from_signature, leaf_public_key, sign_digest, ChainLayout, Digest},
};

/// Tree height and Winternitz parameter of the stateful hash signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureParameters {
    pub(crate) tree_height: u32,
    pub(crate) winternitz: u32,
}

impl SignatureParameters {
    /// Four signatures per key.
    pub const TOY: SignatureParameters = SignatureParameters {
        tree_height: 2,
        winternitz: 16,
    };

    /// Sixteen signatures per key.
    pub const DEFAULT: SignatureParameters = SignatureParameters {
        tree_height: 4,
        winternitz: 16,
    };

    pub fn new(tree_height: u32, winternitz: u32) -> Result<Self> {
        let parameters = SignatureParameters {
            tree_height,
            winternitz,
        };
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tree_height > 20 {
            return Err(PqError::InvalidParameters("tree height must be at most 20"));
        }
        if self.winternitz != 4 && self.winternitz != 16 {
            return Err(PqError::InvalidParameters(
                "Winternitz parameter must be 4 or 16",
            ));
        }
        Ok(())
    }

    pub fn tree_height(&self) -> u32 {
        self.tree_height
    }

    pub fn winternitz(&self) -> u32 {
        self.winternitz
    }

    /// Number of one-time keys, 2^h.
    pub fn capacity(&self) -> u64 {
        1u64 << self.tree_height
    }

    pub fn signature_len(&self) -> usize {
        (self.layout().chain_count() + self.tree_height as usize) * HASH_BYTES + 4
    }

    pub(crate) fn layout(&self) -> ChainLayout {
        ChainLayout::new(self.winternitz)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    root: Digest,
    parameters: SignatureParameters,
}

impl PublicKey {
    pub fn parameters(&self) -> &SignatureParameters {
        &self.parameters
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.root.to_vec()
    }

    pub fn from_bytes(bytes: &[u8], parameters: &SignatureParameters) -> Result<Self> {
        expect_length(bytes, HASH_BYTES)?;
        let mut root = [0u8; HASH_BYTES];
        root.copy_from_slice(bytes);
        Ok(PublicKey {
            root,
            parameters: *parameters,
        })
    }

    pub fn fingerprint(&self) -> String {
        hex::encode(&self.root[..8])
    }
}

/// Stateful signing key. Each leaf of the tree signs at most once; the index
/// of the next unused leaf only moves forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    secret_seed: Digest,
    tree: MerkleTree,
    next_leaf: u64,
    parameters: SignatureParameters,
}

impl SigningKey {
    pub fn parameters(&self) -> &SignatureParameters {
        &self.parameters
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            root: self.tree.root(),
            parameters: self.parameters,
        }
    }

    pub fn next_leaf(&self) -> u64 {
        self.next_leaf
    }

    pub fn remaining_signatures(&self) -> u64 {
        self.parameters.capacity() - self.next_leaf
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    leaf_index: u32,
    reveals: Vec<Digest>,
    authentication_path: Vec<Digest>,
}

impl Signature {
    pub fn leaf_index(&self) -> u32 {
        self.leaf_index
    }

    /// Chain reveals, then the authentication path bottom up, then the leaf
    /// index as little-endian u32.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self
            .reveals
            .iter()
            .chain(self.authentication_path.iter())
            .flatten()
            .copied()
            .collect_vec();
        bytes.extend_from_slice(&self.leaf_index.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8], parameters: &SignatureParameters) -> Result<Self> {
        expect_length(bytes, parameters.signature_len())?;
        let (digests, index) = bytes.split_at(bytes.len() - 4);
        let mut index_bytes = [0u8; 4];
        index_bytes.copy_from_slice(index);
        let leaf_index = u32::from_le_bytes(index_bytes);
        if leaf_index as u64 >= parameters.capacity() {
            return Err(DeserializationError::InvalidLeafIndex {
                index: leaf_index,
                capacity: parameters.capacity(),
            }
            .into());
        }

        let mut digests = digests
            .chunks(HASH_BYTES)
            .map(|chunk| {
                let mut digest = [0u8; HASH_BYTES];
                digest.copy_from_slice(chunk);
                digest
            })
            .collect_vec();
        let authentication_path = digests.split_off(parameters.layout().chain_count());
        Ok(Signature {
            leaf_index,
            reveals: digests,
            authentication_path,
        })
    }
}

/// XMSS-style stateful signature: Winternitz one-time keys under a Merkle
/// tree whose root is the public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashSignature<H: SymmetricPrimitive = Sha3> {
    parameters: SignatureParameters,
    _hash: PhantomData<H>,
}

impl<H: SymmetricPrimitive> HashSignature<H> {
    pub fn new(parameters: SignatureParameters) -> Result<Self> {
        parameters.validate()?;
        Ok(Self {
            parameters,
            _hash: PhantomData,
        })
    }

    pub fn parameters(&self) -> &SignatureParameters {
        &self.parameters
    }

    /// Generate a key pair using randomness supplied by the operating system.
    pub fn generate(&self) -> (SigningKey, PublicKey) {
        self.keygen(&mut thread_rng())
    }

    /// Generate a key pair pseudorandomly by expanding a given seed.
    pub fn keygen_from_seed(&self, seed: [u8; 32]) -> (SigningKey, PublicKey) {
        self.keygen(&mut ChaCha20Rng::from_seed(seed))
    }

    pub fn keygen<R: RngCore + CryptoRng>(&self, rng: &mut R) -> (SigningKey, PublicKey) {
        let secret_seed: Digest = rng.gen();
        let layout = self.parameters.layout();
        let capacity = self.parameters.capacity();
        debug!(
            "hash signature keygen: h = {}, w = {}, {} leaves",
            self.parameters.tree_height, self.parameters.winternitz, capacity
        );

        let leaves = (0..capacity as u32)
            .map(|leaf| leaf_public_key::<H>(&layout, &secret_seed, leaf))
            .collect_vec();
        let tree = MerkleTree::build::<H>(leaves);

        let signing_key = SigningKey {
            secret_seed,
            tree,
            next_leaf: 0,
            parameters: self.parameters,
        };
        let public_key = signing_key.public_key();
        (signing_key, public_key)
    }

    /// Sign with the next unused leaf and advance the key. An exhausted key
    /// is left untouched.
    pub fn sign(&self, sk: &mut SigningKey, message: &[u8]) -> Result<Signature> {
        if sk.parameters != self.parameters {
            return Err(PqError::InvalidParameters(
                "signing key belongs to a different parameter set",
            ));
        }
        let capacity = sk.parameters.capacity();
        if sk.next_leaf >= capacity {
            trace!("hash signature: key exhausted after {capacity} signatures");
            return Err(PqError::KeysExhausted { capacity });
        }

        let leaf_index = sk.next_leaf as u32;
        debug!(
            "hash signature: signing with leaf {} of {}",
            leaf_index, capacity
        );
        let digest = Self::message_digest(&sk.tree.root(), leaf_index, message);
        let reveals =
            sign_digest::<H>(&sk.parameters.layout(), &sk.secret_seed, leaf_index, &digest);
        let authentication_path = sk.tree.authentication_path(leaf_index)?;
        sk.next_leaf += 1;

        Ok(Signature {
            leaf_index,
            reveals,
            authentication_path,
        })
    }

    /// Malformed signatures verify false rather than failing.
    pub fn verify(&self, pk: &PublicKey, message: &[u8], signature: &Signature) -> bool {
        let parameters = pk.parameters;
        let layout = parameters.layout();
        if signature.reveals.len() != layout.chain_count()
            || signature.authentication_path.len() != parameters.tree_height as usize
            || signature.leaf_index as u64 >= parameters.capacity()
        {
            return false;
        }

        let digest = Self::message_digest(&pk.root, signature.leaf_index, message);
        let leaf =
            leaf_from_signature::<H>(&layout, &signature.reveals, signature.leaf_index, &digest);
        root_from_path::<H>(leaf, signature.leaf_index, &signature.authentication_path) == pk.root
    }

    fn message_digest(root: &Digest, leaf_index: u32, message: &[u8]) -> Digest {
        H::hash(&[DOMAIN_MESSAGE, root, &leaf_index.to_le_bytes(), message])
    }
}

/// A signing key shared between threads. Every call to `sign` consumes a
/// distinct leaf.
#[derive(Debug)]
pub struct SharedSigningKey<H: SymmetricPrimitive = Sha3> {
    scheme: HashSignature<H>,
    key: Mutex<SigningKey>,
}

impl<H: SymmetricPrimitive> SharedSigningKey<H> {
    pub fn new(scheme: HashSignature<H>, key: SigningKey) -> Self {
        Self {
            scheme,
            key: Mutex::new(key),
        }
    }

    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        let mut key = self.key.lock().unwrap_or_else(PoisonError::into_inner);
        self.scheme.sign(&mut key, message)
    }

    pub fn remaining_signatures(&self) -> u64 {
        self.key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remaining_signatures()
    }

    pub fn public_key(&self) -> PublicKey {
        self.key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .public_key()
    }

    pub fn into_inner(self) -> SigningKey {
        self.key.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
