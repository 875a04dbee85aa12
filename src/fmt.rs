/// Whole cents, rounded half away from zero. Sub-cent negatives collapse to 0
/// so they never print as `-$0.00`.
fn cents(val: f64) -> i64 {
    (val * 100.0).round() as i64
}

fn grouped(mut units: u64) -> String {
    let mut groups = Vec::new();
    while units >= 1000 {
        groups.push(format!("{:03}", units % 1000));
        units /= 1000;
    }
    groups.push(units.to_string());
    groups.reverse();
    groups.join(",")
}

fn unsigned(c: i64) -> String {
    let abs = c.unsigned_abs();
    format!("${}.{:02}", grouped(abs / 100), abs % 100)
}

/// Balance or amount for tables: `$1,234.56`, `-$42.10`.
pub fn money(val: f64) -> String {
    let c = cents(val);
    if c < 0 {
        format!("-{}", unsigned(c))
    } else {
        unsigned(c)
    }
}

/// Ledger entry with an explicit direction: `+$2,500.00`, `-$12.50`.
pub fn signed_money(val: f64) -> String {
    let c = cents(val);
    match c.signum() {
        -1 => format!("-{}", unsigned(c)),
        1 => format!("+{}", unsigned(c)),
        _ => unsigned(c),
    }
}
