use std::str::FromStr;
use std::time::Duration;

/// `1h`, `30m`, `1d`, `1h15m30s`; a bare number is seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                let factor = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    'd' => 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_seconds = total_seconds.saturating_add(num.saturating_mul(factor));
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        if !current_number.is_empty() {
            let num = current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_seconds = total_seconds.saturating_add(num);
            has_unit = true;
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }
        if total_seconds == 0 {
            return Err("Duration must be greater than zero".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}
