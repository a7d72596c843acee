//! `${cron(every 5 minutes)}`: human-readable schedules to 5-field cron expressions
//!
//! A valid cron expression is passed through unchanged.
use super::{Outcome, Request, ResolverFailure, ResolverResult};

const WEEKDAYS: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

pub(crate) fn resolve(request: &Request) -> ResolverResult {
    let call = request.call("cron")?;
    if !call.suffix.trim().is_empty() {
        return Err(ResolverFailure::Syntax(format!(
            "unexpected `{}` after cron(...)",
            call.suffix.trim()
        )));
    }

    let phrase = call.args.trim();
    let phrase = crate::expression::parse_quoted(phrase).unwrap_or_else(|| phrase.to_string());
    translate(&phrase)
        .map(|cron| Outcome::Found(cron.into()))
        .map_err(ResolverFailure::Syntax)
}

/// Translate `phrase` into a cron expression
pub fn translate(phrase: &str) -> Result<String, String> {
    let normalized = phrase.trim().to_lowercase();
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

    if is_cron_expression(&normalized) {
        return Ok(normalized);
    }

    let (schedule, at) = match normalized.split_once(" at ") {
        Some((schedule, at)) => (schedule, Some(parse_time(at)?)),
        None => (normalized.as_str(), None),
    };
    let (hour, minute) = at.unwrap_or((0, 0));

    let cron = match schedule {
        "every minute" => "* * * * *".to_string(),
        "hourly" | "every hour" => format!("{minute} * * * *"),
        "daily" | "every day" => format!("{minute} {hour} * * *"),
        "weekdays" | "every weekday" => format!("{minute} {hour} * * 1-5"),
        "weekends" | "every weekend" => format!("{minute} {hour} * * 0,6"),
        "weekly" | "every week" => format!("{minute} {hour} * * 0"),
        "monthly" | "every month" => format!("{minute} {hour} 1 * *"),
        "yearly" | "annually" | "every year" => format!("{minute} {hour} 1 1 *"),
        "noon" => "0 12 * * *".to_string(),
        "midnight" => "0 0 * * *".to_string(),
        other => return interval(other, hour, minute, at.is_some()),
    };

    Ok(cron)
}

fn interval(schedule: &str, hour: u32, minute: u32, has_time: bool) -> Result<String, String> {
    let unknown = || format!("unknown schedule `{schedule}`");
    let rest = schedule.strip_prefix("every ").ok_or_else(unknown)?;

    if let Some(day) = WEEKDAYS.iter().position(|day| rest == *day) {
        return Ok(format!("{minute} {hour} * * {day}"));
    }

    let (count, unit) = rest.split_once(' ').ok_or_else(unknown)?;
    let count: u32 = count.parse().map_err(|_| unknown())?;
    if count == 0 {
        return Err(format!("interval must be positive in `{schedule}`"));
    }

    match unit.trim_end_matches('s') {
        "minute" if !has_time => Ok(format!("*/{count} * * * *")),
        "hour" if !has_time => Ok(format!("0 */{count} * * *")),
        "day" => Ok(format!("{minute} {hour} */{count} * *")),
        _ => Err(unknown()),
    }
}

/// `9`, `9:30`, `9am`, `9:30pm`, `21:15`
fn parse_time(text: &str) -> Result<(u32, u32), String> {
    let invalid = || format!("invalid time `{text}`");
    let text = text.trim();

    let (clock, meridiem) = if let Some(clock) = text.strip_suffix("am") {
        (clock.trim(), Some(false))
    } else if let Some(clock) = text.strip_suffix("pm") {
        (clock.trim(), Some(true))
    } else {
        (text, None)
    };

    let (hour, minute) = match clock.split_once(':') {
        Some((hour, minute)) => (hour, minute),
        None => (clock, "0"),
    };
    let mut hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;

    match meridiem {
        Some(_) if !(1..=12).contains(&hour) => return Err(invalid()),
        Some(false) if hour == 12 => hour = 0,
        Some(true) if hour != 12 => hour += 12,
        _ => {}
    }

    if hour > 23 || minute > 59 {
        return Err(invalid());
    }

    Ok((hour, minute))
}

fn is_cron_expression(text: &str) -> bool {
    let fields: Vec<&str> = text.split(' ').collect();
    fields.len() == 5
        && fields.iter().all(|field| {
            field
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '*' | '/' | ',' | '-'))
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::resolvers::test::{context, request};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn phrases() {
        let cases = [
            ("every minute", "* * * * *"),
            ("every 5 minutes", "*/5 * * * *"),
            ("hourly", "0 * * * *"),
            ("every 2 hours", "0 */2 * * *"),
            ("daily", "0 0 * * *"),
            ("daily at 9:30", "30 9 * * *"),
            ("every 3 days at 6pm", "0 18 */3 * *"),
            ("weekdays at 8am", "0 8 * * 1-5"),
            ("weekends", "0 0 * * 0,6"),
            ("weekly", "0 0 * * 0"),
            ("monthly", "0 0 1 * *"),
            ("yearly", "0 0 1 1 *"),
            ("every Monday at 12am", "0 0 * * 1"),
            ("noon", "0 12 * * *"),
            ("midnight", "0 0 * * *"),
            ("  Every   Friday  ", "0 0 * * 5"),
            ("*/15 0 * * 1-5", "*/15 0 * * 1-5"),
        ];

        for (phrase, expected) in cases {
            assert_eq!(translate(phrase).as_deref(), Ok(expected), "{phrase}");
        }
    }

    #[test]
    fn rejected_phrases() {
        for phrase in ["whenever", "every 0 minutes", "daily at 25:00", "every 5 minutes at 9"] {
            assert!(translate(phrase).is_err(), "{phrase}");
        }
    }

    #[test]
    fn resolves_quoted_and_bare() {
        let context = context(Value::default());
        assert_eq!(
            resolve(&request("cron('every 10 minutes')", &context)),
            Ok(Outcome::Found("*/10 * * * *".into()))
        );
        assert!(matches!(
            resolve(&request("cron(at some point)", &context)),
            Err(ResolverFailure::Syntax(_))
        ));
    }
}
