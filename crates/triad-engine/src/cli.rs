//! Command-line flags and their application on top of the YAML config.

use std::path::PathBuf;

use clap::Parser;
use triad_core::config::{StdoutFormat, TriadConfig};
use triad_types::{
    EngineMode, KoppaMode, KoppaSchedule, OracleMode, PsiMode, PsiTransform, TriggerSource,
};

/// Deterministic triadic rational tick engine.
///
/// Every flag overrides the matching value from the config file. Policy
/// tokens are case-insensitive and accept short forms (`-p D -k A -e Q`).
#[derive(Debug, Parser)]
#[command(name = "triad-engine")]
#[command(version, about)]
pub struct Cli {
    /// Upsilon seed, `<int>` or `<int>/<int>` [default: 19/7]
    #[arg(short = 'u', long)]
    pub upsilon: Option<String>,

    /// Beta seed, `<int>` or `<int>/<int>` [default: 89/11]
    #[arg(short = 'b', long)]
    pub beta: Option<String>,

    /// Psi mode: FORCED, RHO_TRIGGERED, DUAL, CRITICAL_IMBALANCE [default: DUAL]
    #[arg(short = 'p', long)]
    pub psi: Option<PsiMode>,

    /// Psi-transform form: DUAL_RECIPROCAL, RECIPROCAL_SWAP
    #[arg(long)]
    pub psi_transform: Option<PsiTransform>,

    /// Koppa mode: ACCUMULATE, DUMP, RATIO_FEED [default: ACCUMULATE]
    #[arg(short = 'k', long)]
    pub koppa: Option<KoppaMode>,

    /// Koppa schedule: POSITIONAL, FIXED
    #[arg(long)]
    pub koppa_schedule: Option<KoppaSchedule>,

    /// Propagation engine: QUIET_ADDITIVE, ADDITIVE, MULTIPLICATIVE, ROTATIONAL
    /// [default: QUIET_ADDITIVE]
    #[arg(short = 'e', long)]
    pub engine: Option<EngineMode>,

    /// Primality oracle: MILLER_RABIN, ALWAYS_PRIME, NEVER_PRIME
    #[arg(long)]
    pub oracle: Option<OracleMode>,

    /// Integers tested on emission: SHADOW_NUMERATOR, LIVE_FRACTION
    #[arg(long)]
    pub trigger: Option<TriggerSource>,

    /// Force a trigger at microtick 10 when none fired
    #[arg(long)]
    pub forced_emission: bool,

    /// Macro-ticks to run [default: 100]
    #[arg(short = 't', long)]
    pub ticks: Option<u64>,

    /// Print every macro-tick to stdout
    #[arg(short = 'o', long)]
    pub out: bool,

    /// Print to stdout as JSON lines (implies --out)
    #[arg(long)]
    pub json: bool,

    /// Write the emission log to this CSV file
    #[arg(short = 'c', long)]
    pub csv: Option<PathBuf>,

    /// YAML config file [default: triad-config.yaml if present]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stop after this many seconds of wall-clock time.
    ///
    /// Checked between macro-ticks only. One macro-tick can run far past the
    /// limit once Miller-Rabin is testing very large numerators, and the run
    /// cannot be stopped any other way.
    #[arg(long)]
    pub max_seconds: Option<u64>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut TriadConfig) {
        if let Some(upsilon) = &self.upsilon {
            config.seeds.upsilon.clone_from(upsilon);
        }
        if let Some(beta) = &self.beta {
            config.seeds.beta.clone_from(beta);
        }

        let policies = &mut config.policies;
        if let Some(psi) = self.psi {
            policies.psi = psi;
        }
        if let Some(form) = self.psi_transform {
            policies.psi_transform = form;
        }
        if let Some(koppa) = self.koppa {
            policies.koppa = koppa;
        }
        if let Some(schedule) = self.koppa_schedule {
            policies.koppa_schedule = schedule;
        }
        if let Some(engine) = self.engine {
            policies.engine = engine;
        }
        if let Some(oracle) = self.oracle {
            policies.oracle = oracle;
        }
        if let Some(trigger) = self.trigger {
            policies.trigger = trigger;
        }
        if self.forced_emission {
            policies.forced_emission = true;
        }

        if let Some(ticks) = self.ticks {
            config.run.ticks = ticks;
        }
        if let Some(seconds) = self.max_seconds {
            config.run.max_real_time_seconds = seconds;
        }

        if self.out || self.json {
            config.output.stdout = true;
        }
        if self.json {
            config.output.format = StdoutFormat::Json;
        }
        if let Some(path) = &self.csv {
            config.output.csv_path = Some(path.clone());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("triad-engine").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn no_flags_keep_the_config() {
        let mut config = TriadConfig::default();
        parse(&[]).apply(&mut config);
        assert_eq!(config, TriadConfig::default());
    }

    #[test]
    fn short_policy_tokens() {
        let mut config = TriadConfig::default();
        parse(&["-p", "f", "-k", "D", "-e", "r", "-t", "5"]).apply(&mut config);
        assert_eq!(config.policies.psi, PsiMode::Forced);
        assert_eq!(config.policies.koppa, KoppaMode::Dump);
        assert_eq!(config.policies.engine, EngineMode::Rotational);
        assert_eq!(config.run.ticks, 5);
    }

    #[test]
    fn seeds_and_outputs() {
        let mut config = TriadConfig::default();
        parse(&["-u", "22/7", "-b", "3", "--json", "-c", "out.csv", "--max-seconds", "30"])
            .apply(&mut config);
        assert_eq!(config.seeds.upsilon, "22/7");
        assert_eq!(config.seeds.beta, "3");
        assert!(config.output.stdout);
        assert_eq!(config.output.format, StdoutFormat::Json);
        assert_eq!(config.output.csv_path, Some(PathBuf::from("out.csv")));
        assert_eq!(config.run.max_real_time_seconds, 30);
    }

    #[test]
    fn long_policy_names() {
        let mut config = TriadConfig::default();
        parse(&[
            "--psi-transform",
            "reciprocal-swap",
            "--koppa-schedule",
            "FIXED",
            "--oracle",
            "NEVER",
            "--trigger",
            "live",
            "--forced-emission",
        ])
        .apply(&mut config);
        assert_eq!(config.policies.psi_transform, PsiTransform::ReciprocalSwap);
        assert_eq!(config.policies.koppa_schedule, KoppaSchedule::Fixed);
        assert_eq!(config.policies.oracle, OracleMode::NeverPrime);
        assert_eq!(config.policies.trigger, TriggerSource::LiveFraction);
        assert!(config.policies.forced_emission);
    }

    #[test]
    fn max_seconds_help_warns_about_long_macroticks() {
        let command = Cli::command();
        let arg = command
            .get_arguments()
            .find(|arg| arg.get_id() == "max_seconds")
            .unwrap();
        let help = arg.get_long_help().unwrap().to_string();
        assert!(help.contains("between macro-ticks"));
        assert!(help.contains("Miller-Rabin"));
    }

    #[test]
    fn unknown_policy_token_is_rejected() {
        let args = ["triad-engine", "--psi", "SIDEWAYS"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
