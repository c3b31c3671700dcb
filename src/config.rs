use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::{ FixedOffset, Offset, Utc };
use rust_decimal::Decimal;

const WEST_AFRICA_OFFSET_SECS: i32 = 60 * 60;

/// Bounds and timezone used when validating and scheduling purchases.
#[derive(Debug, Clone)]
pub struct PurchaseRules {
    pub min_airtime_amount: Decimal,
    pub max_airtime_amount: Decimal,
    /// Timezone in which times of day, weekdays and budget months are evaluated.
    pub schedule_offset: FixedOffset,
}

impl Default for PurchaseRules {
    fn default() -> Self {
        Self {
            min_airtime_amount: Decimal::from(50),
            max_airtime_amount: Decimal::from(50_000),
            schedule_offset: FixedOffset::east_opt(WEST_AFRICA_OFFSET_SECS).unwrap_or(Utc.fix()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub interval: Duration,
    pub batch_size: u64,
    pub claim_lease: Duration,
    pub pending_timeout: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60),
            batch_size: 50,
            claim_lease: Duration::from_secs(300),
            pending_timeout: Duration::from_secs(900),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VtuSettings {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub vtu: VtuSettings,
    pub scheduler: SchedulerSettings,
    pub rules: PurchaseRules,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = parse_or("SERVER_PORT", 8080u16)?;

        let vtu = VtuSettings {
            base_url: env::var("VTU_BASE_URL")?.trim_end_matches('/').to_string(),
            api_key: env::var("VTU_API_KEY")?,
            timeout: Duration::from_secs(parse_or("VTU_TIMEOUT_SECS", 30u64)?),
        };

        let scheduler = SchedulerSettings {
            enabled: parse_or("SCHEDULER_ENABLED", true)?,
            interval: Duration::from_secs(parse_or("SCHEDULER_INTERVAL_SECS", 60u64)?),
            batch_size: parse_or("SCHEDULER_BATCH_SIZE", 50u64)?,
            claim_lease: Duration::from_secs(parse_or("SCHEDULER_CLAIM_LEASE_SECS", 300u64)?),
            pending_timeout: Duration::from_secs(
                parse_or("RECONCILIATION_PENDING_TIMEOUT_SECS", 900u64)?
            ),
        };

        if scheduler.batch_size == 0 {
            return Err("SCHEDULER_BATCH_SIZE must be greater than zero".into());
        }

        let offset_minutes: i32 = parse_or("SCHEDULE_UTC_OFFSET_MINUTES", 60)?;
        let schedule_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or(
            "SCHEDULE_UTC_OFFSET_MINUTES must be between -1439 and 1439"
        )?;

        let rules = PurchaseRules {
            min_airtime_amount: parse_or("MIN_AIRTIME_AMOUNT", Decimal::from(50))?,
            max_airtime_amount: parse_or("MAX_AIRTIME_AMOUNT", Decimal::from(50_000))?,
            schedule_offset,
        };

        if rules.min_airtime_amount > rules.max_airtime_amount {
            return Err("MIN_AIRTIME_AMOUNT must not exceed MAX_AIRTIME_AMOUNT".into());
        }

        Ok(Config {
            database_url,
            server_host,
            server_port,
            vtu,
            scheduler,
            rules,
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
    where T: FromStr, T::Err: std::fmt::Display
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| format!("{} is invalid: {}", key, e).into()),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_use_west_africa_time() {
        let rules = PurchaseRules::default();
        assert_eq!(rules.schedule_offset.local_minus_utc(), 3600);
        assert!(rules.min_airtime_amount < rules.max_airtime_amount);
    }

    #[test]
    fn test_parse_or_falls_back_when_unset() {
        let value: u64 = parse_or("TOPUP_ENGINE_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
