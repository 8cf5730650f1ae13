//! Sanctioned mixed-class combinations for binary dispatch.
//!
//! When the two operands of an operator resolve to different methods the
//! dispatcher normally warns and falls back to the primitive. A small set
//! of class pairs is explicitly compatible (time spans combined with
//! absolute times); each rule names which side's method wins. The table is
//! a runtime-extensible list, not hard-coded logic: the default set is not
//! assumed exhaustive.

use once_cell::sync::Lazy;

/// Which operand's method a compatibility rule prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredSide {
    Left,
    Right,
}

/// One sanctioned pair: the *matched* class of the left and right
/// resolutions, and the winning side.
#[derive(Debug, Clone)]
pub struct CompatRule {
    pub left: String,
    pub right: String,
    pub prefer: PreferredSide,
}

impl CompatRule {
    pub fn new(left: &str, right: &str, prefer: PreferredSide) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
            prefer,
        }
    }
}

// Time spans mix with absolute times; the absolute-time side's method
// understands both classes and wins.
static DEFAULT_RULES: Lazy<Vec<CompatRule>> = Lazy::new(|| {
    vec![
        CompatRule::new("difftime", "POSIXt", PreferredSide::Right),
        CompatRule::new("POSIXt", "difftime", PreferredSide::Left),
        CompatRule::new("difftime", "Date", PreferredSide::Right),
        CompatRule::new("Date", "difftime", PreferredSide::Left),
    ]
});

/// The pluggable compatibility-rule table.
#[derive(Debug, Clone)]
pub struct CompatTable {
    rules: Vec<CompatRule>,
}

impl CompatTable {
    /// The standard rule set.
    pub fn standard() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }

    /// No sanctioned pairs at all.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: CompatRule) {
        self.rules.push(rule);
    }

    /// Whether `left_class` and `right_class` (the matched classes of the
    /// two resolutions) are a sanctioned pair, and which side wins.
    pub fn sanctioned(&self, left_class: &str, right_class: &str) -> Option<PreferredSide> {
        self.rules
            .iter()
            .find(|r| r.left == left_class && r.right == right_class)
            .map(|r| r.prefer)
    }
}

impl Default for CompatTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_rules_are_directional() {
        let t = CompatTable::standard();
        assert_eq!(
            t.sanctioned("difftime", "POSIXt"),
            Some(PreferredSide::Right)
        );
        assert_eq!(
            t.sanctioned("POSIXt", "difftime"),
            Some(PreferredSide::Left)
        );
        assert_eq!(t.sanctioned("difftime", "difftime"), None);
        assert_eq!(t.sanctioned("foo", "bar"), None);
    }

    #[test]
    fn test_table_is_extensible() {
        let mut t = CompatTable::empty();
        assert_eq!(t.sanctioned("difftime", "Date"), None);
        t.add_rule(CompatRule::new("money", "rate", PreferredSide::Left));
        assert_eq!(t.sanctioned("money", "rate"), Some(PreferredSide::Left));
    }
}
