//! Recommendation composition as an ordered policy table.

use crate::data::domain::AcuteClass;

pub const BALANCED_DIET: &str = "Balanced diet with vegetables, pulses, milk.";
pub const MAM_ADVICE: &str = "Increase protein and calorie intake: lentils, banana, oil.";
pub const SAM_ADVICE: &str = "Severe risk: high protein + energy dense foods + clinical referral.";
pub const STUNTING_ADVICE: &str = "Focus on long-term protein and micronutrients.";
pub const ANEMIA_ADVICE: &str = "Iron-rich foods: spinach, ragi, jaggery + Vitamin C fruits.";

/// Condition that fires a policy entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trigger {
    Acute(AcuteClass),
    Stunting,
    Anemia,
}

impl Trigger {
    fn fires(self, acute: AcuteClass, stunting: bool, anemia: bool) -> bool {
        match self {
            Trigger::Acute(class) => class == acute,
            Trigger::Stunting => stunting,
            Trigger::Anemia => anemia,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct PolicyEntry {
    pub trigger: Trigger,
    pub advice: &'static str,
}

/// Emission order is table order: acute guidance, then stunting, then anemia.
pub const POLICY: [PolicyEntry; 5] = [
    PolicyEntry {
        trigger: Trigger::Acute(AcuteClass::Normal),
        advice: BALANCED_DIET,
    },
    PolicyEntry {
        trigger: Trigger::Acute(AcuteClass::Mam),
        advice: MAM_ADVICE,
    },
    PolicyEntry {
        trigger: Trigger::Acute(AcuteClass::Sam),
        advice: SAM_ADVICE,
    },
    PolicyEntry {
        trigger: Trigger::Stunting,
        advice: STUNTING_ADVICE,
    },
    PolicyEntry {
        trigger: Trigger::Anemia,
        advice: ANEMIA_ADVICE,
    },
];

pub fn acute_text(class: AcuteClass) -> &'static str {
    class.text()
}

/// Ordered, duplicate-free advice for the three signals. Never empty.
pub fn build_recommendations(acute: AcuteClass, stunting: bool, anemia: bool) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(3);
    for entry in POLICY.iter().filter(|e| e.trigger.fires(acute, stunting, anemia)) {
        if !out.iter().any(|existing| existing == entry.advice) {
            out.push(entry.advice.to_string());
        }
    }
    if out.is_empty() {
        out.push(BALANCED_DIET.to_string());
    }
    out
}
