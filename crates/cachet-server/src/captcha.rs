//! Proof-of-human challenge generation.
//!
//! The generator is a black box to the handshake: it produces an expected
//! answer and something renderable. The default implementation is a small
//! arithmetic expression rendered as SVG; deployments wanting harder
//! challenges swap in their own [`CaptchaGenerator`].

use rand::Rng;

pub struct CaptchaChallenge {
    /// Expected answer, compared verbatim (case-sensitive).
    pub answer: String,
    /// Renderable challenge (SVG markup).
    pub svg: String,
}

pub trait CaptchaGenerator: Send + Sync {
    fn generate(&self) -> CaptchaChallenge;
}

/// `a + b` or `a - b` with operands in 0..=12, never negative.
#[derive(Debug, Default, Clone)]
pub struct MathCaptcha;

impl CaptchaGenerator for MathCaptcha {
    fn generate(&self) -> CaptchaChallenge {
        let mut rng = rand::thread_rng();

        let a: i32 = rng.gen_range(0..=12);
        let b: i32 = rng.gen_range(0..=12);
        let (text, answer) = if rng.gen_bool(0.5) {
            (format!("{a} + {b} ="), a + b)
        } else {
            let (hi, lo) = (a.max(b), a.min(b));
            (format!("{hi} - {lo} ="), hi - lo)
        };

        let svg = format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="150" height="50" viewBox="0 0 150 50">"#,
                r##"<rect width="150" height="50" fill="#f4f0e8"/>"##,
                r#"<text x="20" y="32" font-family="serif" font-size="22">{}</text>"#,
                "</svg>"
            ),
            text
        );

        CaptchaChallenge {
            answer: answer.to_string(),
            svg,
        }
    }
}
