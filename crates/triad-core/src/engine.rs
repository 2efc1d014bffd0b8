//! The microtick state machine.
//!
//! Each macro-tick is 11 microticks. Every microtick first resets rho, then
//! runs exactly one phase, chosen by position:
//!
//! 1. **Emission** (1, 4, 7, 10) -- ask the oracle about the tracked
//!    numerator; on a trigger, update koppa under the effective mode.
//! 2. **Transformation** (2, 5, 8, 11) -- apply the psi-transform when the
//!    configured [`PsiMode`] says so.
//! 3. **Propagation** (3, 6, 9) -- apply the configured [`EngineMode`].
//!
//! A microtick is atomic. Phase results are computed from the current state
//! first and committed only once nothing can fail, so a `DivideByZero`
//! leaves every field (including the position counters) untouched.
//!
//! [`PsiMode`]: triad_types::PsiMode
//! [`EngineMode`]: triad_types::EngineMode

use num_bigint::BigInt;
use tracing::{debug, info, trace};
use triad_types::{
    MICROTICKS_PER_TICK, Phase, RationalError, RationalValue, Rho, TickEvent, TriggerSource,
};

use crate::config::PolicyConfig;
use crate::oracle::{self, PrimalityOracle};
use crate::phases;

/// Errors that can occur while advancing the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A koppa update or psi-transform divided by a zero numerator.
    #[error("rational error at step {step}, microtick {microtick}: {source}")]
    Rational {
        /// Step of the failed microtick.
        step: u64,
        /// Position of the failed microtick.
        microtick: u8,
        /// The underlying rational error.
        source: RationalError,
    },

    /// The step counter would overflow.
    #[error("step counter overflow: cannot advance beyond u64::MAX")]
    StepOverflow,
}

/// The full mutable state of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    upsilon: RationalValue,
    beta: RationalValue,
    koppa: RationalValue,
    upsilon_shadow_num: BigInt,
    beta_shadow_num: BigInt,
    rho: Rho,
    microtick: u8,
    step: u64,
    transformed: bool,
}

impl EngineState {
    /// State seeded from two fractions, before any microtick.
    fn seeded(upsilon: RationalValue, beta: RationalValue, step: u64) -> Self {
        Self {
            upsilon_shadow_num: upsilon.numer().clone(),
            beta_shadow_num: beta.numer().clone(),
            upsilon,
            beta,
            koppa: RationalValue::one(),
            rho: Rho::None,
            microtick: 0,
            step,
            transformed: false,
        }
    }

    /// Current upsilon.
    pub const fn upsilon(&self) -> &RationalValue {
        &self.upsilon
    }

    /// Current beta.
    pub const fn beta(&self) -> &RationalValue {
        &self.beta
    }

    /// Current koppa.
    pub const fn koppa(&self) -> &RationalValue {
        &self.koppa
    }

    /// Upsilon shadow numerator (the integer the prime trigger tests).
    pub const fn upsilon_shadow_num(&self) -> &BigInt {
        &self.upsilon_shadow_num
    }

    /// Beta shadow numerator.
    pub const fn beta_shadow_num(&self) -> &BigInt {
        &self.beta_shadow_num
    }

    /// Trigger code of the last microtick.
    pub const fn rho(&self) -> Rho {
        self.rho
    }

    /// Last processed microtick (0 before the first advance).
    pub const fn microtick(&self) -> u8 {
        self.microtick
    }

    /// Macro-tick counter.
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Whether the last microtick applied the psi-transform.
    pub const fn transformed(&self) -> bool {
        self.transformed
    }

    /// Shadow-ledger difference `upsilon_shadow - beta_shadow`.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn psi_precursor(&self) -> BigInt {
        &self.upsilon_shadow_num - &self.beta_shadow_num
    }
}

/// What a single phase decided to change.
enum Change {
    /// Nothing to commit besides the position and rho.
    Unchanged,
    /// Emission produced a new koppa.
    Koppa(RationalValue),
    /// Propagation produced a new pair and possibly a shadow advance.
    Propagated(phases::Propagated),
    /// The psi-transform produced a new pair.
    Transformed(RationalValue, RationalValue),
}

/// Deterministic triadic tick engine.
///
/// Owns the [`EngineState`], the configured [`PolicyConfig`], and the
/// injected [`PrimalityOracle`]. Not shareable across threads while running:
/// every advance takes `&mut self`.
#[derive(Debug)]
pub struct TickEngine {
    state: EngineState,
    policies: PolicyConfig,
    oracle: Box<dyn PrimalityOracle>,
}

impl TickEngine {
    /// Create an engine using the oracle named by `policies.oracle`.
    ///
    /// The engine starts with `upsilon = beta = koppa = 1/1` at step 0; call
    /// [`TickEngine::initialize`] to seed it.
    pub fn new(policies: PolicyConfig) -> Self {
        Self::with_oracle(policies, oracle::oracle_for(policies.oracle))
    }

    /// Create an engine with an explicitly injected oracle.
    ///
    /// `policies.oracle` is kept for reporting only.
    pub fn with_oracle(policies: PolicyConfig, oracle: Box<dyn PrimalityOracle>) -> Self {
        Self {
            state: EngineState::seeded(RationalValue::one(), RationalValue::one(), 0),
            policies,
            oracle,
        }
    }

    /// Seed upsilon and beta and reset everything else.
    ///
    /// Koppa becomes `1/1`, the shadow numerators take the seed numerators,
    /// rho and the microtick reset, and step is bumped by one.
    pub fn initialize(&mut self, upsilon_seed: RationalValue, beta_seed: RationalValue) {
        let step = self.state.step.saturating_add(1);
        info!(
            upsilon = %upsilon_seed,
            beta = %beta_seed,
            step,
            "Engine initialized"
        );
        self.state = EngineState::seeded(upsilon_seed, beta_seed, step);
    }

    /// Read-only view of the state.
    pub const fn state(&self) -> &EngineState {
        &self.state
    }

    /// The policies fixed at construction.
    pub const fn policies(&self) -> &PolicyConfig {
        &self.policies
    }

    /// Snapshot of the current state.
    pub fn snapshot(&self) -> TickEvent {
        TickEvent {
            step: self.state.step,
            microtick: self.state.microtick,
            rho: self.state.rho,
            upsilon: self.state.upsilon.clone(),
            beta: self.state.beta.clone(),
            koppa: self.state.koppa.clone(),
            transformed: self.state.transformed,
            psi_precursor: self.state.psi_precursor(),
        }
    }

    /// Advance one microtick and return the resulting snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Rational`] if a koppa update or psi-transform
    /// divides by zero, or [`EngineError::StepOverflow`] if the step counter
    /// is exhausted. In both cases the state is unchanged.
    pub fn advance_microtick(&mut self) -> Result<TickEvent, EngineError> {
        let (microtick, step) = self.next_position()?;

        let rho = match Phase::of(microtick) {
            Some(Phase::Emission) => self.emission_rho(microtick),
            _ => Rho::None,
        };

        let change = self
            .phase_change(microtick, rho)
            .map_err(|source| EngineError::Rational {
                step,
                microtick,
                source,
            })?;

        self.commit(microtick, step, rho, change);
        trace!(step, microtick, rho = ?rho, "Microtick complete");
        Ok(self.snapshot())
    }

    /// Advance `count` microticks and return the final snapshot.
    ///
    /// A full macro-tick is `count = 11`. If a microtick fails, the ones
    /// before it stay committed and the error is returned.
    ///
    /// # Errors
    ///
    /// Propagates the first [`EngineError`] from
    /// [`TickEngine::advance_microtick`].
    pub fn advance_macrotick(&mut self, count: usize) -> Result<TickEvent, EngineError> {
        for _ in 0..count {
            self.advance_microtick()?;
        }
        Ok(self.snapshot())
    }

    /// Advance `count` microticks and return one snapshot per microtick.
    ///
    /// # Errors
    ///
    /// Propagates the first [`EngineError`] from
    /// [`TickEngine::advance_microtick`].
    pub fn advance_macrotick_events(
        &mut self,
        count: usize,
    ) -> Result<Vec<TickEvent>, EngineError> {
        (0..count).map(|_| self.advance_microtick()).collect()
    }

    /// The position after the current one, wrapping 11 -> 1 and bumping step.
    fn next_position(&self) -> Result<(u8, u64), EngineError> {
        if self.state.microtick >= MICROTICKS_PER_TICK {
            let step = self
                .state
                .step
                .checked_add(1)
                .ok_or(EngineError::StepOverflow)?;
            Ok((1, step))
        } else {
            Ok((self.state.microtick.saturating_add(1), self.state.step))
        }
    }

    /// Consult the oracle for an emission microtick.
    fn emission_rho(&self, microtick: u8) -> Rho {
        let rho = match self.policies.trigger {
            TriggerSource::ShadowNumerator => {
                if self.oracle.is_prime(&self.state.upsilon_shadow_num) {
                    Rho::Num
                } else {
                    Rho::None
                }
            }
            TriggerSource::LiveFraction => {
                let num = self.oracle.is_prime(self.state.upsilon.numer());
                let den = self.oracle.is_prime(self.state.upsilon.denom());
                match (num, den) {
                    (true, true) => Rho::Both,
                    (true, false) => Rho::Num,
                    (false, true) => Rho::Den,
                    (false, false) => Rho::None,
                }
            }
        };

        if rho == Rho::None && self.policies.forced_emission && microtick == 10 {
            Rho::Forced
        } else {
            rho
        }
    }

    /// Compute the phase result without touching state.
    fn phase_change(&self, microtick: u8, rho: Rho) -> Result<Change, RationalError> {
        let s = &self.state;
        match Phase::of(microtick) {
            Some(Phase::Emission) if rho.is_triggered() => {
                let mode = phases::effective_koppa_mode(
                    microtick,
                    self.policies.koppa,
                    self.policies.koppa_schedule,
                );
                let koppa = phases::update_koppa(mode, &s.koppa, &s.upsilon, &s.beta)?;
                debug!(step = s.step, microtick, rho = ?rho, koppa_mode = %mode, "Emission");
                Ok(Change::Koppa(koppa))
            }
            Some(Phase::Propagation) => Ok(Change::Propagated(phases::propagate(
                self.policies.engine,
                &s.upsilon,
                &s.beta,
            )?)),
            Some(Phase::Transformation)
                if phases::should_transform(self.policies.psi, microtick, rho, &s.koppa) =>
            {
                let (upsilon, beta) = phases::psi_transform(
                    self.policies.psi_transform,
                    &s.upsilon,
                    &s.beta,
                    &s.koppa,
                )?;
                debug!(step = s.step, microtick, psi = %self.policies.psi, "Psi-transform");
                Ok(Change::Transformed(upsilon, beta))
            }
            _ => Ok(Change::Unchanged),
        }
    }

    /// Apply a successfully computed microtick.
    #[allow(clippy::arithmetic_side_effects)]
    fn commit(&mut self, microtick: u8, step: u64, rho: Rho, change: Change) {
        let s = &mut self.state;
        s.microtick = microtick;
        s.step = step;
        s.rho = rho;
        s.transformed = false;

        match change {
            Change::Unchanged => {}
            Change::Koppa(koppa) => s.koppa = koppa,
            Change::Propagated(p) => {
                s.upsilon = p.upsilon;
                s.beta = p.beta;
                if let Some(delta) = p.shadow_delta {
                    s.upsilon_shadow_num += &delta;
                    s.beta_shadow_num -= &delta;
                }
            }
            Change::Transformed(upsilon, beta) => {
                s.upsilon = upsilon;
                s.beta = beta;
                s.transformed = true;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use triad_types::{EngineMode, KoppaMode, OracleMode, PsiMode, PsiTransform};

    use super::*;
    use crate::oracle::{AlwaysPrime, NeverPrime};

    fn r(n: i64, d: i64) -> RationalValue {
        RationalValue::new(n, d).unwrap()
    }

    fn policies(psi: PsiMode, koppa: KoppaMode, engine: EngineMode) -> PolicyConfig {
        PolicyConfig {
            psi,
            koppa,
            engine,
            ..PolicyConfig::default()
        }
    }

    #[test]
    fn fresh_engine_is_unit_state() {
        let engine = TickEngine::new(PolicyConfig::default());
        let s = engine.state();
        assert_eq!(s.upsilon(), &RationalValue::one());
        assert_eq!(s.koppa(), &RationalValue::one());
        assert_eq!(s.step(), 0);
        assert_eq!(s.microtick(), 0);
    }

    #[test]
    fn initialize_resets_and_bumps_step() {
        let mut engine = TickEngine::new(PolicyConfig::default());
        engine.initialize(r(19, 7), r(89, 11));
        let s = engine.state();
        assert_eq!(s.koppa(), &r(1, 1));
        assert_eq!(s.microtick(), 0);
        assert_eq!(s.rho(), Rho::None);
        assert_eq!(s.step(), 1);
        assert_eq!(s.upsilon_shadow_num(), &BigInt::from(19));
        assert_eq!(s.beta_shadow_num(), &BigInt::from(89));
        assert_eq!(s.psi_precursor(), BigInt::from(-70));

        engine.initialize(r(2, 3), r(5, 7));
        assert_eq!(engine.state().step(), 2);
    }

    #[test]
    fn quiet_additive_keeps_shadow_ledger_in_step() {
        let mut engine = TickEngine::with_oracle(
            policies(PsiMode::Forced, KoppaMode::Accumulate, EngineMode::QuietAdditive),
            Box::new(NeverPrime),
        );
        engine.initialize(r(19, 7), r(89, 11));
        engine.advance_macrotick(3).unwrap();
        let s = engine.state();
        assert_eq!(s.upsilon(), &r(13195, 5929));
        assert_eq!(s.beta(), &r(79937, 9317));
        assert_eq!(s.upsilon_shadow_num(), &BigInt::from(19 - 414));
        assert_eq!(s.beta_shadow_num(), &BigInt::from(89 + 414));
    }

    #[test]
    fn other_engines_leave_shadow_ledger_alone() {
        for mode in [EngineMode::Additive, EngineMode::Multiplicative, EngineMode::Rotational] {
            let mut engine = TickEngine::with_oracle(
                policies(PsiMode::Forced, KoppaMode::Accumulate, mode),
                Box::new(NeverPrime),
            );
            engine.initialize(r(19, 7), r(89, 11));
            engine.advance_macrotick(10).unwrap();
            assert_eq!(engine.state().upsilon_shadow_num(), &BigInt::from(19));
            assert_eq!(engine.state().beta_shadow_num(), &BigInt::from(89));
        }
    }

    #[test]
    fn shadow_trigger_consults_shadow_numerator() {
        // 19 is prime, so microtick 1 triggers and accumulates.
        let mut engine = TickEngine::new(policies(
            PsiMode::Forced,
            KoppaMode::Accumulate,
            EngineMode::QuietAdditive,
        ));
        engine.initialize(r(19, 7), r(89, 11));
        let event = engine.advance_microtick().unwrap();
        assert_eq!(event.rho, Rho::Num);
        // 1/1 + (19*11 - 89*7)/(7*11)
        assert_eq!(event.koppa, r(77 - 414, 77));

        // 21 is not prime.
        let mut engine = TickEngine::new(PolicyConfig::default());
        engine.initialize(r(21, 7), r(89, 11));
        assert_eq!(engine.advance_microtick().unwrap().rho, Rho::None);
    }

    #[test]
    fn live_fraction_trigger_reports_which_field() {
        let live = PolicyConfig {
            trigger: TriggerSource::LiveFraction,
            psi: PsiMode::Forced,
            ..PolicyConfig::default()
        };
        let cases = [
            ((19, 7), Rho::Both),
            ((19, 8), Rho::Num),
            ((21, 11), Rho::Den),
            ((21, 8), Rho::None),
        ];
        for ((n, d), expected) in cases {
            let mut engine = TickEngine::new(live);
            engine.initialize(r(n, d), r(89, 11));
            assert_eq!(engine.advance_microtick().unwrap().rho, expected, "{n}/{d}");
        }
    }

    #[test]
    fn forced_emission_fires_at_microtick_ten_only() {
        let forced = PolicyConfig {
            forced_emission: true,
            psi: PsiMode::Forced,
            oracle: OracleMode::NeverPrime,
            ..PolicyConfig::default()
        };
        let mut engine = TickEngine::new(forced);
        engine.initialize(r(19, 7), r(89, 11));
        let events = engine.advance_macrotick_events(11).unwrap();
        for event in &events {
            let expected = if event.microtick == 10 { Rho::Forced } else { Rho::None };
            assert_eq!(event.rho, expected);
        }
        // Positional schedule dumps at 10: koppa = upsilon / beta.
        let before = events.get(8).unwrap();
        let at_ten = events.get(9).unwrap();
        assert_eq!(at_ten.koppa, before.upsilon.checked_div(&before.beta).unwrap());
    }

    #[test]
    fn rho_triggered_psi_never_sees_a_live_trigger() {
        // rho resets at every microtick and only emission microticks set it,
        // so transformation microticks always observe Rho::None.
        let mut engine = TickEngine::with_oracle(
            policies(PsiMode::RhoTriggered, KoppaMode::Accumulate, EngineMode::QuietAdditive),
            Box::new(AlwaysPrime),
        );
        engine.initialize(r(19, 7), r(89, 11));
        let events = engine.advance_macrotick_events(22).unwrap();
        assert!(events.iter().all(|e| !e.transformed));
    }

    #[test]
    fn critical_imbalance_transforms_once_koppa_moves() {
        let mut engine = TickEngine::with_oracle(
            PolicyConfig {
                psi: PsiMode::CriticalImbalance,
                psi_transform: PsiTransform::ReciprocalSwap,
                ..PolicyConfig::default()
            },
            Box::new(NeverPrime),
        );
        engine.initialize(r(19, 7), r(89, 11));
        // Koppa stays 1/1 without triggers: no transform ever.
        let events = engine.advance_macrotick_events(11).unwrap();
        assert!(events.iter().all(|e| !e.transformed));

        let mut engine = TickEngine::with_oracle(
            PolicyConfig {
                psi: PsiMode::CriticalImbalance,
                psi_transform: PsiTransform::ReciprocalSwap,
                ..PolicyConfig::default()
            },
            Box::new(AlwaysPrime),
        );
        engine.initialize(r(19, 7), r(89, 11));
        engine.advance_microtick().unwrap();
        let event = engine.advance_microtick().unwrap();
        assert!(event.transformed);
        // (19/7, 89/11) -> (11/19, 7/89)
        assert_eq!(event.upsilon, r(11, 19));
        assert_eq!(event.beta, r(7, 89));
    }

    #[test]
    fn failed_microtick_leaves_state_untouched() {
        // Rotational swaps, always-prime triggers every emission:
        // m1 koppa = 1 + (0 - 5) = -4/1
        // m3 swap -> (5/1, 0/1)
        // m4 koppa = -4/1 + 5/1 = 1/1
        // m6 swap -> (0/1, 5/1)
        // m7 feed: koppa = 1/1 * (0/5) = 0/5
        // m9 swap -> (5/1, 0/1)
        // m10 dump: 5/1 / 0/1 fails
        let mut engine = TickEngine::with_oracle(
            policies(PsiMode::Forced, KoppaMode::Accumulate, EngineMode::Rotational),
            Box::new(AlwaysPrime),
        );
        engine.initialize(r(0, 1), r(5, 1));
        engine.advance_macrotick(9).unwrap();
        let before = engine.state().clone();
        assert_eq!(before.koppa(), &r(0, 5));
        assert_eq!(before.beta(), &r(0, 1));

        let err = engine.advance_microtick().unwrap_err();
        assert!(matches!(
            err,
            EngineError::Rational {
                microtick: 10,
                source: RationalError::DivideByZero { .. },
                ..
            }
        ));
        assert_eq!(engine.state(), &before);
        assert_eq!(engine.state().microtick(), 9);
    }
}
