//! Duration display built from a `%d`/`%h`/`%m`/`%s` template.

/// Default template: each `%x` pair is replaced by the unit's value and the
/// letter after it stays as the visible suffix, e.g. `"3d 2h 5m 1s "`.
pub const DEFAULT_DURATION_TEMPLATE: &str = "%dd %hh %mm %ss ";

const DAY_MS: u64 = 24 * 3600 * 1000;
const HOUR_MS: u64 = 3600 * 1000;
const MINUTE_MS: u64 = 60 * 1000;

/// Composes a millisecond count into days/hours/minutes/seconds using the
/// default template. Units whose value is zero are dropped from the output
/// entirely, so five seconds renders as `"5s "` with no `"0d 0h 0m"` noise.
pub fn compose_duration(ms: u64) -> String {
    compose_duration_with(ms, DEFAULT_DURATION_TEMPLATE)
}

/// Composes a millisecond count through a caller-supplied template.
///
/// Days are taken first, then hours from the day remainder, minutes from the
/// hour remainder, and seconds rounded from the minute remainder.
/// Substitution runs in d, h, m, s order and touches only the first match of
/// each marker; a zero-valued unit removes its marker, the run of unit
/// letters after it, and one trailing whitespace character.
pub fn compose_duration_with(ms: u64, template: &str) -> String {
    let days = ms / DAY_MS;
    let day_rem = ms % DAY_MS;
    let hours = day_rem / HOUR_MS;
    let hour_rem = day_rem % HOUR_MS;
    let minutes = hour_rem / MINUTE_MS;
    let minute_rem = hour_rem % MINUTE_MS;
    let seconds = (minute_rem as f64 / 1000.0).round() as u64;

    let mut out = template.to_string();
    for (unit, value) in [('d', days), ('h', hours), ('m', minutes), ('s', seconds)] {
        out = substitute_unit(&out, unit, value);
    }
    out
}

fn substitute_unit(template: &str, unit: char, value: u64) -> String {
    let marker = format!("%{unit}");
    let Some(at) = template.find(&marker) else {
        return template.to_string();
    };
    if value == 0 {
        let mut end = at + marker.len();
        let letters = template[end..].chars().take_while(|&c| c == unit).count();
        end += letters * unit.len_utf8();
        if let Some(c) = template[end..].chars().next() {
            if c.is_whitespace() {
                end += c.len_utf8();
            }
        }
        format!("{}{}", &template[..at], &template[end..])
    } else {
        format!("{}{}{}", &template[..at], value, &template[at + marker.len()..])
    }
}
