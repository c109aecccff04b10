use access_policy::{AccessStatus, ZoneId};
use audit_log::{AuditFilter, ExportFormat};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tapgate", version, about = "NFC access decisions with a durable audit trail")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Path to the credential and zone registry (overrides config file setting)
    #[arg(short, long)]
    pub registry: Option<PathBuf>,

    /// Path to the audit log (overrides config file setting)
    #[arg(long)]
    pub audit_log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decide one card presentation and record it
    Tap {
        /// Card UID as read from the card
        uid: String,

        /// Zone the reader guards
        #[arg(short, long)]
        zone: ZoneId,

        /// Reader id (defaults to tap.default_device_id)
        #[arg(short, long)]
        device: Option<String>,

        /// Tap time as RFC 3339; defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// List recorded attempts, most recent first
    Logs {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long, default_value_t = 50)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Export recorded attempts as JSON or CSV
    Export {
        #[arg(short, long, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        #[command(flatten)]
        filter: FilterArgs,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the zones in the registry
    Zones,

    /// Validate the registry file and print a summary
    Check,
}

/// Audit query criteria shared by `logs` and `export`.
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    #[arg(long)]
    pub uid: Option<String>,

    #[arg(long)]
    pub zone: Option<ZoneId>,

    #[arg(long)]
    pub device: Option<String>,

    /// Resolved owner id
    #[arg(long)]
    pub user: Option<String>,

    /// Only these statuses (repeatable)
    #[arg(long = "status")]
    pub statuses: Vec<AccessStatus>,

    /// Only refused attempts
    #[arg(long)]
    pub failures_only: bool,

    /// Inclusive lower bound, RFC 3339
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// Exclusive upper bound, RFC 3339
    #[arg(long)]
    pub until: Option<DateTime<Utc>>,
}

impl From<FilterArgs> for AuditFilter {
    fn from(args: FilterArgs) -> Self {
        AuditFilter {
            uid: args.uid,
            zone_id: args.zone,
            device_id: args.device,
            resolved_user_id: args.user,
            statuses: args.statuses,
            failures_only: args.failures_only,
            since: args.since,
            until: args.until,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_with_overrides() {
        let cli = Cli::try_parse_from([
            "tapgate",
            "--registry",
            "reg.yaml",
            "tap",
            "04:A1:B2",
            "--zone",
            "3",
            "--device",
            "door-1",
        ])
        .unwrap();
        assert_eq!(cli.registry, Some(PathBuf::from("reg.yaml")));
        match cli.command {
            Command::Tap { uid, zone, device, at } => {
                assert_eq!(uid, "04:A1:B2");
                assert_eq!(zone, 3);
                assert_eq!(device.as_deref(), Some("door-1"));
                assert!(at.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn tap_requires_zone() {
        assert!(Cli::try_parse_from(["tapgate", "tap", "AAA"]).is_err());
    }

    #[test]
    fn logs_filter_maps_to_audit_filter() {
        let cli = Cli::try_parse_from([
            "tapgate",
            "logs",
            "--uid",
            "AAA",
            "--status",
            "expired",
            "--status",
            "BLACKLISTED",
            "--since",
            "2024-06-03T00:00:00Z",
            "--limit",
            "5",
        ])
        .unwrap();
        let Command::Logs {
            filter,
            limit,
            offset,
        } = cli.command
        else {
            panic!("expected logs command");
        };
        assert_eq!((limit, offset), (5, 0));

        let filter = AuditFilter::from(filter);
        assert_eq!(filter.uid.as_deref(), Some("AAA"));
        assert_eq!(
            filter.statuses,
            vec![AccessStatus::Expired, AccessStatus::Blacklisted]
        );
        assert_eq!(
            filter.since,
            Some("2024-06-03T00:00:00Z".parse().unwrap())
        );
        assert!(!filter.failures_only);
    }

    #[test]
    fn export_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["tapgate", "export", "--format", "xml"]).is_err());
        let cli = Cli::try_parse_from(["tapgate", "export", "-f", "csv"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Export {
                format: ExportFormat::Csv,
                ..
            }
        ));
    }
}
