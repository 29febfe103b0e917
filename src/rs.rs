use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;

/// Systematic Reed-Solomon codec over GF(2⁸).
///
/// A codec is parameterized by its parity symbol count `m`. Encoding appends
/// `m` parity symbols computed with the generator polynomial
/// g(x) = ∏_{i=0..m-1} (x − αⁱ),
/// so the first symbols of every codeword equal the message. Decoding is
/// erasure-only: up to `m` known-bad positions can be filled back in. Error
/// location is not performed; the surrounding packet layer discards anything
/// that fails its CRC, so a symbol is either present and correct or missing
/// entirely.
///
/// The codec is stateless once constructed. [`cached`] returns a process-wide
/// shared instance per `m`.
#[derive(Debug)]
pub struct RsCodec {
    m: usize,
    // Generator polynomial in descending powers, gen[0] = 1, length m + 1.
    gen: Vec<u8>,
}

/// Error produced by the Reed-Solomon codec.
///
/// This enum lists the errors that can be produced by [`RsCodec`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Error)]
pub enum RsError {
    /// The codeword would exceed the 255-symbol limit of GF(2⁸).
    #[error("codeword exceeds 255 symbols")]
    CodewordTooLong,
    /// The codeword does not contain a message symbol.
    #[error("codeword shorter than parity length")]
    CodewordTooShort,
    /// More erasures than parity symbols.
    #[error("more erasures than parity symbols")]
    TooManyErasures,
    /// An erasure position is out of range or repeated.
    #[error("invalid erasure position")]
    BadErasurePosition,
    /// The corrected codeword is not a valid codeword.
    #[error("inconsistent codeword after erasure correction")]
    Unrecoverable,
}

impl RsCodec {
    /// Creates a codec producing `m` parity symbols.
    ///
    /// `m = 0` is a valid degenerate codec: encoding is the identity and
    /// decoding succeeds only with no erasures.
    pub fn new(m: u8) -> RsCodec {
        let m = usize::from(m);
        let mut gen = vec![1u8];
        for i in 0..m {
            // multiply gen by (x − αⁱ)
            let root = alpha_pow(i);
            let mut next = vec![0u8; gen.len() + 1];
            for (j, &c) in gen.iter().enumerate() {
                next[j] ^= c;
                next[j + 1] ^= gf_mul(c, root);
            }
            gen = next;
        }
        RsCodec { m, gen }
    }

    /// Returns the parity symbol count.
    pub fn parity_len(&self) -> usize {
        self.m
    }

    /// Encodes `msg`, returning the codeword `msg || parity`.
    ///
    /// The parity is the remainder of msg(x)·xᵐ divided by the generator
    /// polynomial, computed by synthetic division.
    pub fn encode(&self, msg: &[u8]) -> Result<Vec<u8>, RsError> {
        let n = msg.len() + self.m;
        if n > 255 {
            return Err(RsError::CodewordTooLong);
        }
        let mut parity = vec![0u8; self.m];
        for &b in msg {
            let feedback = b ^ parity.first().copied().unwrap_or(0);
            parity.rotate_left(1);
            if self.m > 0 {
                parity[self.m - 1] = 0;
            }
            if feedback != 0 {
                for (p, &g) in parity.iter_mut().zip(&self.gen[1..]) {
                    *p ^= gf_mul(feedback, g);
                }
            }
        }
        let mut codeword = Vec::with_capacity(n);
        codeword.extend_from_slice(msg);
        codeword.extend_from_slice(&parity);
        Ok(codeword)
    }

    /// Decodes a codeword with erasures at the given positions, returning the
    /// message symbols.
    ///
    /// `erasures` lists distinct positions in `[0, codeword.len())` whose
    /// values are unknown; whatever bytes the caller placed there are
    /// ignored. At most `m` positions can be erased. Positions known to be
    /// zero (padding) must carry a zero byte and must not be listed.
    pub fn decode_erasures(
        &self,
        codeword: &[u8],
        erasures: &[usize],
    ) -> Result<Vec<u8>, RsError> {
        let n = codeword.len();
        if n > 255 {
            return Err(RsError::CodewordTooLong);
        }
        if n < self.m {
            return Err(RsError::CodewordTooShort);
        }
        if erasures.len() > self.m {
            return Err(RsError::TooManyErasures);
        }
        let mut seen = [false; 255];
        for &p in erasures {
            if p >= n || seen[p] {
                return Err(RsError::BadErasurePosition);
            }
            seen[p] = true;
        }

        let mut cw = codeword.to_vec();
        // Erased values are unknown; pinning them to zero makes the error
        // value at an erased position equal to the true symbol value.
        for &p in erasures {
            cw[p] = 0;
        }

        let syndromes: Vec<u8> = (0..self.m).map(|i| eval_desc(&cw, alpha_pow(i))).collect();
        if syndromes.iter().all(|&s| s == 0) {
            // Every erased symbol really was zero.
            return Ok(cw[..n - self.m].to_vec());
        }
        if erasures.is_empty() {
            return Err(RsError::Unrecoverable);
        }

        // Erasure locator Λ(x) = ∏ (1 − X_p x) with X_p = α^(n−1−p).
        let locators: Vec<u8> = erasures.iter().map(|&p| alpha_pow(n - 1 - p)).collect();
        let mut lambda = vec![1u8];
        for &x in &locators {
            let mut next = vec![0u8; lambda.len() + 1];
            for (i, &c) in lambda.iter().enumerate() {
                next[i] ^= c;
                next[i + 1] ^= gf_mul(c, x);
            }
            lambda = next;
        }

        // Evaluator Ω(x) = S(x)·Λ(x) mod xᵐ.
        let mut omega = vec![0u8; self.m];
        for (i, &s) in syndromes.iter().enumerate() {
            for (j, &l) in lambda.iter().enumerate() {
                if i + j < self.m {
                    omega[i + j] ^= gf_mul(s, l);
                }
            }
        }

        // Forney: value at position p is X_p·Ω(X_p⁻¹) / Λ′(X_p⁻¹). The
        // formal derivative in characteristic 2 keeps odd-degree terms only.
        for (&p, &xp) in erasures.iter().zip(&locators) {
            let xi = gf_inv(xp);
            let num = gf_mul(xp, eval_asc(&omega, xi));
            let mut den = 0u8;
            for (i, &l) in lambda.iter().enumerate().skip(1).step_by(2) {
                den ^= gf_mul(l, gf_pow(xi, i - 1));
            }
            if den == 0 {
                return Err(RsError::Unrecoverable);
            }
            cw[p] = gf_div(num, den);
        }

        // A filled-in codeword must vanish at every generator root.
        for i in 0..self.m {
            if eval_desc(&cw, alpha_pow(i)) != 0 {
                return Err(RsError::Unrecoverable);
            }
        }
        Ok(cw[..n - self.m].to_vec())
    }
}

/// Returns the process-wide shared codec for `m` parity symbols.
///
/// Codecs are immutable after construction, so one instance per `m` is shared
/// by every image session in the process.
pub(crate) fn cached(m: u8) -> Arc<RsCodec> {
    static CACHE: OnceLock<Mutex<HashMap<u8, Arc<RsCodec>>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    // The map stays usable even if another thread panicked mid-insert.
    let mut cache = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(
        cache
            .entry(m)
            .or_insert_with(|| Arc::new(RsCodec::new(m))),
    )
}

// Evaluate a polynomial given in descending powers (p[0] is the coefficient
// of the highest power) by Horner's rule.
fn eval_desc(poly: &[u8], x: u8) -> u8 {
    poly.iter().fold(0, |acc, &c| gf_mul(acc, x) ^ c)
}

// Evaluate a polynomial given in ascending powers.
fn eval_asc(poly: &[u8], x: u8) -> u8 {
    poly.iter().rev().fold(0, |acc, &c| gf_mul(acc, x) ^ c)
}

// Arithmetic in GF(2⁸), realized as GF(2)[x] / (x⁸ + x⁴ + x³ + x² + 1)
// (0x11D, generator α = 0x02). Symbols are plain bytes: addition is XOR, and
// products, quotients and powers go through the exponential/logarithm tables
// generated into OUT_DIR at build time.

fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    EXP[(usize::from(LOG[usize::from(a)]) + usize::from(LOG[usize::from(b)])) % 255]
}

fn gf_inv(a: u8) -> u8 {
    assert_ne!(a, 0);
    // α has order 255, so the inverse of αᵉ is α^(255−e)
    EXP[(255 - usize::from(LOG[usize::from(a)])) % 255]
}

fn gf_div(a: u8, b: u8) -> u8 {
    gf_mul(a, gf_inv(b))
}

fn gf_pow(a: u8, e: usize) -> u8 {
    if e == 0 {
        1
    } else if a == 0 {
        0
    } else {
        EXP[usize::from(LOG[usize::from(a)]) * e % 255]
    }
}

fn alpha_pow(e: usize) -> u8 {
    EXP[e % 255]
}

// Exponential table: EXP[e] = αᵉ for e = 0..=254. The last entry is unused.
static EXP: [u8; 256] = include!(concat!(env!("OUT_DIR"), "/gf256_exp_table.rs"));

// Logarithm table: LOG[v] is the exponent e with αᵉ = v, for v ≥ 1. The
// 0-th entry is unused, the logarithm of zero being undefined.
static LOG: [u8; 256] = include!(concat!(env!("OUT_DIR"), "/gf256_log_table.rs"));
