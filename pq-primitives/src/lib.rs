//! Teaching-grade post-quantum primitives.
//!
//! This crate implements three public-key schemes over a small shared
//! substrate of modular arithmetic, hashing and noise sampling:
//!
//!  - [`lwe`]: Regev-style encryption of single bits under the Learning With
//!    Errors assumption.
//!  - [`kem`]: a simplified Kyber-style key encapsulation mechanism over
//!    Z_q[X] / <X^n + 1>, with a Fujisaki–Okamoto transform and implicit
//!    rejection.
//!  - [`hash_signature`]: a stateful XMSS-style signature scheme built from
//!    Winternitz hash chains under a Merkle tree.
//!
//! The parameter sets are small and none of the arithmetic is constant
//! time. Do not use this crate to protect anything.
//!
//! # Usage
//!
//! Encrypting a bit:
//! ```
//! use pq_primitives::lwe::{LweParameters, LweScheme};
//!
//! use rand::thread_rng;
//!
//! let scheme = LweScheme::new(LweParameters::TOY).unwrap();
//! let (sk, pk) = scheme.generate();
//! let ciphertext = scheme.encrypt(&pk, true, &mut thread_rng()).unwrap();
//! assert!(scheme.decrypt(&sk, &ciphertext).unwrap());
//! ```
//!
//! Agreeing on a key:
//! ```
//! use pq_primitives::kem::{Ciphertext, KemParameters, LatticeKem};
//!
//! use rand::thread_rng;
//!
//! let kem: LatticeKem = LatticeKem::new(KemParameters::STANDARD).unwrap();
//! let (sk, pk) = kem.generate().unwrap();
//! let (ciphertext, sender_secret) = kem.encapsulate(&pk, &mut thread_rng()).unwrap();
//!
//! let received = Ciphertext::from_bytes(&ciphertext.to_bytes(), kem.parameters()).unwrap();
//! let receiver_secret = kem.decapsulate(&sk, &received).unwrap();
//! assert_eq!(sender_secret, receiver_secret);
//! ```
//!
//! Signing, until the key runs out:
//! ```
//! use pq_primitives::hash_signature::{HashSignature, SignatureParameters};
//! use pq_primitives::PqError;
//!
//! let scheme: HashSignature = HashSignature::new(SignatureParameters::TOY).unwrap();
//! let (mut sk, pk) = scheme.generate();
//! for _ in 0..4 {
//!     let sig = scheme.sign(&mut sk, b"Hello, world!").unwrap();
//!     assert!(scheme.verify(&pk, b"Hello, world!", &sig));
//! }
//! assert!(matches!(
//!     scheme.sign(&mut sk, b"Hello, world!"),
//!     Err(PqError::KeysExhausted { capacity: 4 })
//! ));
//! ```

pub(crate) mod encoding;
pub mod error;
pub mod field;
pub mod hash;
pub mod hash_signature;
pub mod kem;
pub mod lwe;
pub mod matrix;
pub mod merkle;
pub mod polynomial;
pub mod ring;
pub mod sampler;
pub mod wots;

pub use error::{DeserializationError, PqError, Result};
