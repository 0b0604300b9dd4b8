//! Glicko-2 single-game update (Glickman, "Example of the Glicko-2 system").
//!
//! The learner plays one rating period containing a single game against a
//! puzzle. Volatility is solved with the Illinois variant of regula falsi,
//! bounded by `max_iterations` so pathological inputs fail instead of spinning.

use std::f64::consts::PI;

use crate::rating::config::Glicko2Config;
use crate::rating::error::EngineError;
use crate::rating::types::Outcome;

/// Display-scale to Glicko-2 scale factor.
const SCALE: f64 = 173.7178;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlickoRating {
    pub rating: f64,
    pub deviation: f64,
    pub volatility: f64,
}

fn to_mu(rating: f64, base: f64) -> f64 {
    (rating - base) / SCALE
}

fn to_phi(deviation: f64) -> f64 {
    deviation / SCALE
}

fn g(phi: f64) -> f64 {
    1.0 / (1.0 + 3.0 * phi * phi / (PI * PI)).sqrt()
}

fn expected(mu: f64, mu_j: f64, g_j: f64) -> f64 {
    1.0 / (1.0 + (-g_j * (mu - mu_j)).exp())
}

fn check_input(name: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::RatingComputation(format!(
            "{name} must be finite and positive, got {value}"
        )))
    }
}

/// New rating after one game against a fixed-rating opponent.
///
/// The opponent's uncertainty is fixed at `puzzle_deviation`; its volatility
/// never enters a single-game update. Deviation and volatility are clamped
/// into the configured bounds before the volatility iteration. Non-finite or
/// non-positive inputs and non-converging iterations are errors.
pub fn rate(
    player: &GlickoRating,
    opponent_rating: f64,
    outcome: Outcome,
    config: &Glicko2Config,
) -> Result<GlickoRating, EngineError> {
    if !player.rating.is_finite() {
        return Err(EngineError::RatingComputation(format!(
            "rating must be finite, got {}",
            player.rating
        )));
    }
    if !opponent_rating.is_finite() {
        return Err(EngineError::RatingComputation(format!(
            "opponent rating must be finite, got {opponent_rating}"
        )));
    }
    check_input("rating deviation", player.deviation)?;
    check_input("volatility", player.volatility)?;

    let deviation = player
        .deviation
        .clamp(config.min_deviation, config.max_deviation);
    let volatility = player
        .volatility
        .clamp(config.min_volatility, config.max_volatility);

    let base = config.default_rating;
    let mu = to_mu(player.rating, base);
    let phi = to_phi(deviation);
    let mu_j = to_mu(opponent_rating, base);
    let g_j = g(to_phi(config.puzzle_deviation));
    let e = expected(mu, mu_j, g_j);
    let score = outcome.value();

    let information = g_j * g_j * e * (1.0 - e);
    if !(information.is_finite() && information > 0.0) {
        return Err(EngineError::RatingComputation(format!(
            "degenerate expected score {e} (rating gap too large)"
        )));
    }
    let v = 1.0 / information;
    let delta = v * g_j * (score - e);

    let sigma = solve_volatility(phi, v, delta, volatility, config)?;

    let phi_star = (phi * phi + sigma * sigma).sqrt();
    let phi_new = 1.0 / (1.0 / (phi_star * phi_star) + 1.0 / v).sqrt();
    let mu_new = mu + phi_new * phi_new * g_j * (score - e);

    let result = GlickoRating {
        rating: mu_new * SCALE + base,
        deviation: (phi_new * SCALE).clamp(config.min_deviation, config.max_deviation),
        volatility: sigma.clamp(config.min_volatility, config.max_volatility),
    };

    if !result.rating.is_finite() {
        return Err(EngineError::RatingComputation(
            "updated rating is not finite".to_string(),
        ));
    }
    check_input("updated rating deviation", result.deviation)?;
    check_input("updated volatility", result.volatility)?;
    Ok(result)
}

fn solve_volatility(
    phi: f64,
    v: f64,
    delta: f64,
    sigma: f64,
    config: &Glicko2Config,
) -> Result<f64, EngineError> {
    let tau = config.tau;
    let a = (sigma * sigma).ln();
    let phi_sq = phi * phi;
    let delta_sq = delta * delta;

    let f = |x: f64| {
        let ex = x.exp();
        let denom = phi_sq + v + ex;
        ex * (delta_sq - phi_sq - v - ex) / (2.0 * denom * denom) - (x - a) / (tau * tau)
    };

    let mut big_a = a;
    let mut big_b = if delta_sq > phi_sq + v {
        (delta_sq - phi_sq - v).ln()
    } else {
        let mut k = 1.0;
        let mut bracketed = false;
        for _ in 0..config.max_iterations {
            if f(a - k * tau) >= 0.0 {
                bracketed = true;
                break;
            }
            k += 1.0;
        }
        if !bracketed {
            return Err(EngineError::RatingComputation(
                "volatility bracket search did not terminate".to_string(),
            ));
        }
        a - k * tau
    };

    let mut f_a = f(big_a);
    let mut f_b = f(big_b);
    let mut converged = false;

    for _ in 0..config.max_iterations {
        if (big_b - big_a).abs() <= config.convergence_tolerance {
            converged = true;
            break;
        }
        let big_c = big_a + (big_a - big_b) * f_a / (f_b - f_a);
        let f_c = f(big_c);
        if !f_c.is_finite() {
            break;
        }
        if f_c * f_b <= 0.0 {
            big_a = big_b;
            f_a = f_b;
        } else {
            f_a /= 2.0;
        }
        big_b = big_c;
        f_b = f_c;
    }
    converged = converged || (big_b - big_a).abs() <= config.convergence_tolerance;

    if !converged {
        return Err(EngineError::RatingComputation(format!(
            "volatility did not converge within {} iterations",
            config.max_iterations
        )));
    }

    let sigma_new = (big_a / 2.0).exp();
    if sigma_new.is_finite() && sigma_new > 0.0 {
        Ok(sigma_new)
    } else {
        Err(EngineError::RatingComputation(format!(
            "volatility collapsed to {sigma_new}"
        )))
    }
}
