//! Side-by-side timings and artifact sizes for the schemes in
//! `pq-primitives`.

use std::fmt::Display;
use std::time::{Duration, Instant};

use log::{info, warn};
use pq_primitives::{
    hash_signature::{HashSignature, PublicKey, Signature, SignatureParameters},
    kem::{KemParameters, LatticeKem},
    lwe::{LweParameters, LweScheme},
    Result,
};
use rand::{CryptoRng, Rng, RngCore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkConfig {
    /// Repetitions per operation.
    pub iterations: usize,
    pub lwe: LweParameters,
    pub kem: KemParameters,
    pub signature: SignatureParameters,
}

impl BenchmarkConfig {
    pub const QUICK: BenchmarkConfig = BenchmarkConfig {
        iterations: 3,
        lwe: LweParameters::TOY,
        kem: KemParameters::TOY,
        signature: SignatureParameters::TOY,
    };
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            lwe: LweParameters::DEMO,
            kem: KemParameters::STANDARD,
            signature: SignatureParameters::DEFAULT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkReport {
    pub scheme: &'static str,
    pub operation: &'static str,
    pub iterations: usize,
    pub total: Duration,
    pub mean: Duration,
    pub public_key_bytes: usize,
    pub ciphertext_bytes: Option<usize>,
    pub signature_bytes: Option<usize>,
    /// Calls whose result was wrong, e.g. a valid signature that did not verify.
    pub failures: usize,
}

impl BenchmarkReport {
    fn new(scheme: &'static str, operation: &'static str, iterations: usize, total: Duration) -> Self {
        Self {
            scheme,
            operation,
            iterations,
            total,
            mean: total / iterations.max(1) as u32,
            public_key_bytes: 0,
            ciphertext_bytes: None,
            signature_bytes: None,
            failures: 0,
        }
    }
}

impl Display for BenchmarkReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = |s: Option<usize>| s.map_or("-".to_string(), |s| s.to_string());
        write!(
            f,
            "{:<16} {:<12} {:>6} x {:>12?} | pk {:>6} B | ct {:>6} B | sig {:>6} B",
            self.scheme,
            self.operation,
            self.iterations,
            self.mean,
            self.public_key_bytes,
            size(self.ciphertext_bytes),
            size(self.signature_bytes),
        )?;
        if self.failures > 0 {
            write!(f, " | {} FAILED", self.failures)?;
        }
        Ok(())
    }
}

/// Run `operation` `iterations` times and return the summed wall-clock time
/// of the calls alone.
fn time<F: FnMut() -> Result<Duration>>(iterations: usize, mut operation: F) -> Result<Duration> {
    let mut total = Duration::ZERO;
    for _ in 0..iterations {
        total += operation()?;
    }
    Ok(total)
}

fn stopwatch<T, F: FnOnce() -> T>(f: F) -> (T, Duration) {
    let start = Instant::now();
    let output = f();
    (output, start.elapsed())
}

/// Time `iterations` verifications and count the ones that rejected.
fn time_verification(
    scheme: &HashSignature,
    pk: &PublicKey,
    message: &[u8],
    signature: &Signature,
    iterations: usize,
) -> (Duration, usize) {
    let mut total = Duration::ZERO;
    let mut failures = 0;
    for _ in 0..iterations {
        let (valid, elapsed) = stopwatch(|| scheme.verify(pk, message, signature));
        total += elapsed;
        if !valid {
            failures += 1;
        }
    }
    if failures > 0 {
        warn!("{failures} of {iterations} verifications rejected");
    }
    (total, failures)
}

/// Time every public operation of the three schemes under `config`.
///
/// Signing consumes one-time leaves; whenever a signing key runs out a fresh
/// one is generated outside the timed region.
pub fn run_comparison<R: RngCore + CryptoRng>(
    config: &BenchmarkConfig,
    rng: &mut R,
) -> Result<Vec<BenchmarkReport>> {
    let iterations = config.iterations;
    let mut reports = vec![];

    // LWE
    let lwe = LweScheme::new(config.lwe)?;
    let (lwe_sk, lwe_pk) = lwe.keygen(rng);
    let lwe_pk_bytes = lwe_pk.to_bytes().len();
    let lwe_ct_bytes = lwe.encrypt(&lwe_pk, false, rng)?.to_bytes(&config.lwe).len();
    let keygen = time(iterations, || Ok(stopwatch(|| lwe.keygen(rng)).1))?;
    let encrypt = time(iterations, || {
        let bit = rng.gen::<bool>();
        let (ciphertext, elapsed) = stopwatch(|| lwe.encrypt(&lwe_pk, bit, rng));
        ciphertext?;
        Ok(elapsed)
    })?;
    let ciphertext = lwe.encrypt(&lwe_pk, true, rng)?;
    let decrypt = time(iterations, || {
        let (bit, elapsed) = stopwatch(|| lwe.decrypt(&lwe_sk, &ciphertext));
        bit?;
        Ok(elapsed)
    })?;
    for (operation, total) in [("keygen", keygen), ("encrypt", encrypt), ("decrypt", decrypt)] {
        let mut report = BenchmarkReport::new("lwe", operation, iterations, total);
        report.public_key_bytes = lwe_pk_bytes;
        report.ciphertext_bytes = Some(lwe_ct_bytes);
        reports.push(report);
    }

    // KEM
    let kem: LatticeKem = LatticeKem::new(config.kem)?;
    let (kem_sk, kem_pk) = kem.keygen(rng)?;
    let kem_pk_bytes = kem_pk.to_bytes().len();
    let (kem_ct, _) = kem.encapsulate(&kem_pk, rng)?;
    let kem_ct_bytes = kem_ct.to_bytes().len();
    let keygen = time(iterations, || {
        let (keys, elapsed) = stopwatch(|| kem.keygen(rng));
        keys?;
        Ok(elapsed)
    })?;
    let encapsulate = time(iterations, || {
        let (output, elapsed) = stopwatch(|| kem.encapsulate(&kem_pk, rng));
        output?;
        Ok(elapsed)
    })?;
    let decapsulate = time(iterations, || {
        let (secret, elapsed) = stopwatch(|| kem.decapsulate(&kem_sk, &kem_ct));
        secret?;
        Ok(elapsed)
    })?;
    for (operation, total) in [
        ("keygen", keygen),
        ("encapsulate", encapsulate),
        ("decapsulate", decapsulate),
    ] {
        let mut report = BenchmarkReport::new("kem", operation, iterations, total);
        report.public_key_bytes = kem_pk_bytes;
        report.ciphertext_bytes = Some(kem_ct_bytes);
        reports.push(report);
    }

    // hash signature
    let scheme: HashSignature = HashSignature::new(config.signature)?;
    let message = b"benchmark message";
    let (mut sig_sk, sig_pk) = scheme.keygen(rng);
    let sig_pk_bytes = sig_pk.to_bytes().len();
    let signature = scheme.sign(&mut sig_sk, message)?;
    let signature_bytes = signature.to_bytes().len();
    let keygen = time(iterations, || Ok(stopwatch(|| scheme.keygen(rng)).1))?;
    let sign = time(iterations, || {
        if sig_sk.remaining_signatures() == 0 {
            sig_sk = scheme.keygen(rng).0;
        }
        let (output, elapsed) = stopwatch(|| scheme.sign(&mut sig_sk, message));
        output?;
        Ok(elapsed)
    })?;
    let (verify, verify_failures) =
        time_verification(&scheme, &sig_pk, message, &signature, iterations);
    for (operation, total, failures) in [
        ("keygen", keygen, 0),
        ("sign", sign, 0),
        ("verify", verify, verify_failures),
    ] {
        let mut report = BenchmarkReport::new("hash-signature", operation, iterations, total);
        report.public_key_bytes = sig_pk_bytes;
        report.signature_bytes = Some(signature_bytes);
        report.failures = failures;
        reports.push(report);
    }

    for report in reports.iter() {
        info!("{report}");
    }
    Ok(reports)
}
