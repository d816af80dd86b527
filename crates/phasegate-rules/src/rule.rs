use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use phasegate_core::{CheckKind, Severity, Violation};
use regex::Regex;

use crate::tokenize::{Span, Term};
use crate::types::{PatternSpec, RuleSpec, ScanContext, ScanInput};

pub trait Rule: Send + Sync {
    fn id(&self) -> &str;
    fn category(&self) -> CheckKind;
    fn severity(&self) -> Severity;
    fn eval(&self, input: &ScanInput) -> Vec<Violation>;
}

/// Whether a category is in force for the given state, before any text is matched.
pub fn category_applies(category: CheckKind, ctx: &ScanContext) -> bool {
    match category {
        CheckKind::PhaseSkip => true,
        CheckKind::ProtectedBranchCoding => ctx.on_protected_branch(),
        // Nothing to slip past once a task is running in a coding phase.
        CheckKind::ContinuationBypass => !(ctx.workflow_active && ctx.phase_permits_coding()),
        CheckKind::CodingWithoutActivation => !ctx.workflow_active,
        CheckKind::PhaseStateMismatch => !ctx.phase_permits_coding(),
        _ => false,
    }
}

#[derive(Clone, Debug)]
struct TermSet {
    terms: Vec<Term>,
}

impl TermSet {
    fn hits(&self, tokens: &[String]) -> Vec<(Span, &str)> {
        self.terms
            .iter()
            .flat_map(|t| t.find_all(tokens).into_iter().map(move |s| (s, t.text.as_str())))
            .collect()
    }
}

enum Matcher {
    Terms(TermSet),
    CoOccurrence(TermSet, TermSet),
    Proximity(TermSet, TermSet, Option<usize>),
    Regex(Vec<Regex>),
}

impl Matcher {
    /// Evidence string for the first match, if any.
    fn find(&self, input: &ScanInput) -> Option<String> {
        match self {
            Matcher::Terms(set) => set.hits(&input.tokens).first().map(|(_, t)| t.to_string()),
            Matcher::CoOccurrence(left, right) => {
                let l = left.hits(&input.tokens);
                let r = right.hits(&input.tokens);
                match (l.first(), r.first()) {
                    (Some((_, a)), Some((_, b))) => Some(format!("{a} … {b}")),
                    _ => None,
                }
            }
            Matcher::Proximity(left, right, window) => {
                let window = window.unwrap_or(input.ctx.continuation_window);
                let r = right.hits(&input.tokens);
                left.hits(&input.tokens).into_iter().find_map(|(ls, a)| {
                    r.iter()
                        .find(|(rs, _)| ls.gap(rs) <= window)
                        .map(|(_, b)| format!("{a} … {b}"))
                })
            }
            Matcher::Regex(exprs) => exprs
                .iter()
                .find_map(|re| re.find(input.text))
                .map(|m| m.as_str().trim().to_string()),
        }
    }
}

/// A rule compiled from one row of the rule table.
pub struct TableRule {
    spec: RuleSpec,
    matcher: Matcher,
}

impl TableRule {
    pub fn compile(spec: RuleSpec, term_sets: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        if !spec.category.is_bypass_category() {
            return Err(anyhow!("rule {}: '{}' is not a bypass category", spec.id, spec.category));
        }
        let set = |name: &str| -> Result<TermSet> {
            let terms = term_sets
                .get(name)
                .ok_or_else(|| anyhow!("rule {}: unknown term set '{}'", spec.id, name))?;
            Ok(TermSet {
                terms: terms.iter().map(|t| Term::new(t)).collect(),
            })
        };
        let matcher = match &spec.pattern {
            PatternSpec::Terms { set: s } => Matcher::Terms(set(s)?),
            PatternSpec::CoOccurrence { left, right } => Matcher::CoOccurrence(set(left)?, set(right)?),
            PatternSpec::Proximity { left, right, window } => Matcher::Proximity(set(left)?, set(right)?, *window),
            PatternSpec::Regex { any } => Matcher::Regex(
                any.iter()
                    .map(|e| Regex::new(e).with_context(|| format!("rule {}: bad regex {e}", spec.id)))
                    .collect::<Result<_>>()?,
            ),
        };
        Ok(Self { spec, matcher })
    }

    fn render(&self, template: &str, evidence: &str, ctx: &ScanContext) -> String {
        template
            .replace("{match}", evidence)
            .replace("{branch}", &ctx.current_branch)
            .replace("{phase}", &ctx.current_phase.to_string())
    }
}

impl Rule for TableRule {
    fn id(&self) -> &str {
        &self.spec.id
    }

    fn category(&self) -> CheckKind {
        self.spec.category
    }

    fn severity(&self) -> Severity {
        self.spec.severity
    }

    fn eval(&self, input: &ScanInput) -> Vec<Violation> {
        if !category_applies(self.category(), input.ctx) {
            return vec![];
        }
        match self.matcher.find(input) {
            Some(evidence) => vec![Violation {
                check_id: self.id().to_string(),
                kind: self.category(),
                severity: self.severity(),
                message: self.render(&self.spec.message, &evidence, input.ctx),
                remediation: self.render(&self.spec.remediation, &evidence, input.ctx),
            }],
            None => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::tokenize;
    use phasegate_core::Phase;

    fn sets() -> BTreeMap<String, Vec<String>> {
        let mut m = BTreeMap::new();
        m.insert("continuation".to_string(), vec!["continue".to_string(), "继续".to_string()]);
        m.insert("coding".to_string(), vec!["write code".to_string(), "写代码".to_string()]);
        m
    }

    fn proximity_rule(window: Option<usize>) -> TableRule {
        TableRule::compile(
            RuleSpec {
                id: "CB-T".into(),
                category: CheckKind::ContinuationBypass,
                severity: Severity::Block,
                pattern: PatternSpec::Proximity {
                    left: "continuation".into(),
                    right: "coding".into(),
                    window,
                },
                message: "saw {match} on {branch}".into(),
                remediation: "stop".into(),
            },
            &sets(),
        )
        .unwrap()
    }

    fn eval(rule: &TableRule, text: &str, ctx: &ScanContext) -> Vec<Violation> {
        rule.eval(&ScanInput {
            text,
            tokens: tokenize(text),
            ctx,
        })
    }

    #[test]
    fn proximity_respects_window_both_orders() {
        let ctx = ScanContext::default();
        let rule = proximity_rule(Some(2));
        assert_eq!(eval(&rule, "continue and write code", &ctx).len(), 1);
        assert_eq!(eval(&rule, "write code, then continue", &ctx).len(), 1);
        assert!(eval(&rule, "continue the long talk before we write code", &ctx).is_empty());
    }

    #[test]
    fn message_placeholders_are_filled() {
        let ctx = ScanContext {
            current_branch: "dev".into(),
            ..ScanContext::default()
        };
        let v = eval(&proximity_rule(None), "继续写代码", &ctx);
        assert_eq!(v[0].message, "saw 继续 … 写代码 on dev");
    }

    #[test]
    fn continuation_is_quiet_inside_an_active_coding_phase() {
        let ctx = ScanContext {
            workflow_active: true,
            current_phase: Phase::Implementation,
            ..ScanContext::default()
        };
        assert!(eval(&proximity_rule(None), "继续写代码", &ctx).is_empty());
    }

    #[test]
    fn unknown_term_set_is_rejected() {
        let err = TableRule::compile(
            RuleSpec {
                id: "X".into(),
                category: CheckKind::PhaseSkip,
                severity: Severity::Warn,
                pattern: PatternSpec::Terms { set: "nope".into() },
                message: String::new(),
                remediation: String::new(),
            },
            &sets(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn non_bypass_category_is_rejected() {
        let err = TableRule::compile(
            RuleSpec {
                id: "X".into(),
                category: CheckKind::BranchBinding,
                severity: Severity::Block,
                pattern: PatternSpec::Terms { set: "coding".into() },
                message: String::new(),
                remediation: String::new(),
            },
            &sets(),
        );
        assert!(err.is_err());
    }
}
