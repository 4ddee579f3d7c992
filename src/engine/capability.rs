//! Service capability tags and the tier predicate over them.
//!
//! Tags come from the service name through a declarative keyword table. The
//! matching code below knows nothing about massage menus; edit `TAG_TABLE` to
//! teach it new names.

use std::collections::BTreeSet;

use crate::model::{Service, SkillTier, Technician};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapabilityTag {
    NeckShoulderHead,
    Foot,
    Back,
    Leg,
    Whole,
    Special,
    Other,
}

impl CapabilityTag {
    pub fn id(&self) -> &'static str {
        match self {
            Self::NeckShoulderHead => "NSH",
            Self::Foot => "FOOT",
            Self::Back => "BACK",
            Self::Leg => "LEG",
            Self::Whole => "WHOLE",
            Self::Special => "SPECIAL",
            Self::Other => "OTHER",
        }
    }
}

pub type TagSet = BTreeSet<CapabilityTag>;

/// How a keyword is looked for in a service name.
#[derive(Debug, Clone, Copy)]
pub enum Pattern {
    /// Case-insensitive substring.
    Word(&'static str),
    /// Uppercase code at the start of any whitespace-separated token.
    Code(&'static str),
    /// Uppercase substring anywhere.
    Contains(&'static str),
    /// Uppercase name starts with.
    Prefix(&'static str),
    /// Uppercase name ends with.
    Suffix(&'static str),
}

impl Pattern {
    fn matches(&self, lower: &str, upper: &str) -> bool {
        match self {
            Pattern::Word(w) => lower.contains(w),
            Pattern::Code(c) => upper.split_whitespace().any(|tok| tok.starts_with(c)),
            Pattern::Contains(s) => upper.contains(s),
            Pattern::Prefix(p) => upper.starts_with(p),
            Pattern::Suffix(s) => upper.ends_with(s),
        }
    }
}

/// Body-area and specialty tags. Any match adds the tag; tags are not exclusive.
pub const TAG_TABLE: &[(CapabilityTag, &[Pattern])] = &[
    (
        CapabilityTag::Foot,
        &[
            Pattern::Word("foot"),
            Pattern::Word("feet"),
            Pattern::Word("reflexology"),
            Pattern::Contains("F("),
            Pattern::Code("NSF"),
            Pattern::Code("NSBF"),
            Pattern::Code("NSBLF"),
            Pattern::Code("WBF"),
            Pattern::Code("NSHEF"),
            Pattern::Suffix("F"),
        ],
    ),
    (
        CapabilityTag::Back,
        &[Pattern::Word("back"), Pattern::Code("NSB"), Pattern::Code("BL"), Pattern::Contains("BHI")],
    ),
    (
        CapabilityTag::Leg,
        &[Pattern::Word("leg"), Pattern::Code("BL"), Pattern::Code("NSBL")],
    ),
    (
        CapabilityTag::Whole,
        &[Pattern::Word("whole"), Pattern::Code("WB")],
    ),
    (
        CapabilityTag::Special,
        &[
            Pattern::Word("remedial"),
            Pattern::Word("dry needling"),
            Pattern::Word("pregnancy"),
            Pattern::Word("children"),
            Pattern::Word("sciatica"),
            Pattern::Word("elbow"),
            Pattern::Word("hip"),
            Pattern::Word("cupping"),
            Pattern::Word("ear candling"),
        ],
    ),
];

/// Neck/shoulder/head applies only when nothing in `TAG_TABLE` matched.
pub const NECK_SHOULDER_HEAD: &[Pattern] = &[
    Pattern::Prefix("NS"),
    Pattern::Word("neck"),
    Pattern::Word("shoulder"),
    Pattern::Word("head"),
];

/// Tags a tier must never see.
const RESTRICTED: [CapabilityTag; 4] = [
    CapabilityTag::Back,
    CapabilityTag::Leg,
    CapabilityTag::Whole,
    CapabilityTag::Special,
];

/// Derive the tag set for a service name. Never empty: `Other` when nothing applies.
pub fn service_tags(name: &str) -> TagSet {
    let raw = name.trim();
    let lower = raw.to_lowercase();
    let upper = raw.to_uppercase();

    let mut tags: TagSet = TAG_TABLE
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|p| p.matches(&lower, &upper)))
        .map(|(tag, _)| *tag)
        .collect();

    if tags.is_empty() && NECK_SHOULDER_HEAD.iter().any(|p| p.matches(&lower, &upper)) {
        tags.insert(CapabilityTag::NeckShoulderHead);
    }
    if tags.is_empty() {
        tags.insert(CapabilityTag::Other);
    }
    tags
}

/// Whether a tier is authorized for a tag set.
pub fn tier_allows(tier: SkillTier, tags: &TagSet) -> bool {
    let only_nsh = tags.len() == 1 && tags.contains(&CapabilityTag::NeckShoulderHead);
    match tier {
        SkillTier::Full => true,
        SkillTier::JuniorBasic => only_nsh,
        SkillTier::JuniorIntermediate => {
            let restricted = RESTRICTED.iter().any(|t| tags.contains(t));
            only_nsh || (tags.contains(&CapabilityTag::Foot) && !restricted)
        }
    }
}

pub fn can_perform(technician: &Technician, service: &Service) -> bool {
    tier_allows(technician.tier, &service_tags(&service.name))
}
