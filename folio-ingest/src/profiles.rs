//! Known statement layouts and the header-scoring heuristic that picks one.

use tracing::debug;

use crate::normalize::DateFormat;

/// Ordered header substrings per logical column. Earlier patterns win.
#[derive(Debug, Clone, Copy)]
pub struct HeaderPatterns {
    pub date: &'static [&'static str],
    pub description: &'static [&'static str],
    pub amount: &'static [&'static str],
    pub credit: &'static [&'static str],
    pub debit: &'static [&'static str],
    pub balance: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct BankFormatProfile {
    pub key: &'static str,
    /// Display name reported as `bank_name`.
    pub name: &'static str,
    pub header_patterns: HeaderPatterns,
    pub date_formats: &'static [DateFormat],
}

impl BankFormatProfile {
    pub fn is_generic(&self) -> bool {
        self.key == GENERIC.key
    }
}

const NG_DATES: &[DateFormat] = &[
    DateFormat::DayMonthNameDash,
    DateFormat::DayMonthSlash,
    DateFormat::DayMonthNameSpace,
];

pub static GENERIC: BankFormatProfile = BankFormatProfile {
    key: "generic",
    name: "Generic",
    header_patterns: HeaderPatterns {
        date: &[
            "transaction date",
            "trans. date",
            "trans date",
            "tran date",
            "posting date",
            "posted date",
            "date posted",
            "date",
        ],
        description: &[
            "description",
            "narration",
            "details",
            "remarks",
            "particulars",
            "memo",
            "payee",
        ],
        amount: &["amount"],
        credit: &["credit", "deposit", "money in", "paid in"],
        debit: &["debit", "withdrawal", "money out", "paid out"],
        balance: &["balance"],
    },
    date_formats: &[
        DateFormat::DayMonthSlash,
        DateFormat::DayMonthDash,
        DateFormat::YearMonthDay,
        DateFormat::DayMonthNameDash,
        DateFormat::DayMonthNameSpace,
    ],
};

/// Bank-specific signatures, scored in this order.
pub static PROFILES: &[BankFormatProfile] = &[
    BankFormatProfile {
        key: "gtbank",
        name: "GTBank",
        header_patterns: HeaderPatterns {
            date: &["trans. date", "value. date"],
            description: &["remarks", "narration"],
            amount: &["amount"],
            credit: &["credits", "credit"],
            debit: &["debits", "debit"],
            balance: &["balance"],
        },
        date_formats: NG_DATES,
    },
    BankFormatProfile {
        key: "access",
        name: "Access Bank",
        header_patterns: HeaderPatterns {
            date: &["posted date", "transaction date"],
            description: &["description"],
            amount: &["amount"],
            credit: &["credit"],
            debit: &["debit"],
            balance: &["balance"],
        },
        date_formats: NG_DATES,
    },
    BankFormatProfile {
        key: "zenith",
        name: "Zenith Bank",
        header_patterns: HeaderPatterns {
            date: &["date posted"],
            description: &["description"],
            amount: &["amount"],
            credit: &["credit"],
            debit: &["debit"],
            balance: &["balance"],
        },
        date_formats: NG_DATES,
    },
    BankFormatProfile {
        key: "firstbank",
        name: "First Bank",
        header_patterns: HeaderPatterns {
            date: &["transdate", "trans date"],
            description: &["details", "narrative"],
            amount: &["amount"],
            credit: &["credit"],
            debit: &["debit"],
            balance: &["balance"],
        },
        date_formats: NG_DATES,
    },
    BankFormatProfile {
        key: "uba",
        name: "UBA",
        header_patterns: HeaderPatterns {
            date: &["tran date"],
            description: &["narration"],
            amount: &["amount"],
            credit: &["credit"],
            debit: &["debit"],
            balance: &["balance"],
        },
        date_formats: NG_DATES,
    },
    BankFormatProfile {
        key: "kuda",
        name: "Kuda",
        header_patterns: HeaderPatterns {
            date: &["date/time"],
            description: &["description", "to / from"],
            amount: &["amount"],
            credit: &["money in"],
            debit: &["money out"],
            balance: &["balance"],
        },
        date_formats: &[DateFormat::DayMonthSlash, DateFormat::DayMonthNameSpace],
    },
    BankFormatProfile {
        key: "chase",
        name: "Chase",
        header_patterns: HeaderPatterns {
            date: &["posting date", "transaction date"],
            description: &["description"],
            amount: &["amount"],
            credit: &["credit"],
            debit: &["debit"],
            balance: &["balance"],
        },
        date_formats: &[DateFormat::MonthDaySlash],
    },
];

fn fold(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolve a caller-supplied bank hint. Unknown hints fall back to [`GENERIC`].
pub fn lookup(hint: &str) -> &'static BankFormatProfile {
    let wanted = fold(hint);
    PROFILES
        .iter()
        .chain(std::iter::once(&GENERIC))
        .find(|p| fold(p.key) == wanted || fold(p.name) == wanted)
        .unwrap_or(&GENERIC)
}

fn score(profile: &BankFormatProfile, headers: &[String]) -> usize {
    let patterns = &profile.header_patterns;
    patterns
        .date
        .iter()
        .chain(patterns.description)
        .filter(|pat| headers.iter().any(|h| h.contains(*pat)))
        .count()
}

/// Pick the first bank profile whose date and description patterns hit at least twice.
pub fn detect(headers: &[String]) -> &'static BankFormatProfile {
    let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    for profile in PROFILES {
        let s = score(profile, &lowered);
        if s >= 2 {
            debug!(bank = profile.key, score = s, "matched bank format");
            return profile;
        }
    }
    debug!("no bank format matched, using generic");
    &GENERIC
}
