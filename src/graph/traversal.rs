//! Typed traversal steps and their Gremlin rendering.
//!
//! A [`Traversal`] only ever holds step names, bound variable names and a
//! few static literals. Values travel separately in [`Bindings`], so the
//! rendered text of a given query shape is identical from call to call.

use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;

/// Named values submitted alongside a traversal.
pub type Bindings = BTreeMap<String, Json>;

/// Step argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Name of a bound variable.
    Bind(String),
    /// Static literal, rendered quoted. Never carries caller data.
    Literal(&'static str),
}

impl Arg {
    pub fn bind(name: impl Into<String>) -> Self {
        Arg::Bind(name.into())
    }

    pub fn literal(text: &'static str) -> Self {
        Arg::Literal(text)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Bind(name) => f.write_str(name),
            Arg::Literal(text) => write!(f, "'{}'", text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    V(Option<Arg>),
    AddV(Arg),
    AddE(Arg),
    To(Traversal),
    HasLabel(Arg),
    Has(Arg, Arg),
    Limit(u32),
    Fold,
    Unfold,
    Coalesce(Vec<Traversal>),
    Property(Arg, Arg),
    ValueMap,
    OutE(Arg),
    Out(Arg),
    GroupCountByLabel,
    Inject(i64),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::V(None) => f.write_str("V()"),
            Step::V(Some(id)) => write!(f, "V({})", id),
            Step::AddV(label) => write!(f, "addV({})", label),
            Step::AddE(label) => write!(f, "addE({})", label),
            Step::To(target) => write!(f, "to({})", target),
            Step::HasLabel(label) => write!(f, "hasLabel({})", label),
            Step::Has(key, value) => write!(f, "has({}, {})", key, value),
            Step::Limit(n) => write!(f, "limit({})", n),
            Step::Fold => f.write_str("fold()"),
            Step::Unfold => f.write_str("unfold()"),
            Step::Coalesce(branches) => {
                f.write_str("coalesce(")?;
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", branch)?;
                }
                f.write_str(")")
            }
            Step::Property(key, value) => write!(f, "property({}, {})", key, value),
            Step::ValueMap => f.write_str("valueMap(true)"),
            Step::OutE(label) => write!(f, "outE({})", label),
            Step::Out(label) => write!(f, "out({})", label),
            Step::GroupCountByLabel => f.write_str("groupCount().by(label)"),
            Step::Inject(n) => write!(f, "inject({})", n),
        }
    }
}

/// A chain of steps, either spawned from the `g` source or anonymous
/// (used inside `coalesce`).
#[derive(Debug, Clone, PartialEq)]
pub struct Traversal {
    spawned: bool,
    steps: Vec<Step>,
}

impl Traversal {
    pub fn g() -> Self {
        Self {
            spawned: true,
            steps: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            spawned: false,
            steps: Vec::new(),
        }
    }

    pub fn is_spawned(&self) -> bool {
        self.spawned
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn extend(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn v(self) -> Self {
        self.step(Step::V(None))
    }

    pub fn v_id(self, id: Arg) -> Self {
        self.step(Step::V(Some(id)))
    }

    pub fn add_v(self, label: Arg) -> Self {
        self.step(Step::AddV(label))
    }

    pub fn add_e(self, label: Arg) -> Self {
        self.step(Step::AddE(label))
    }

    pub fn to(self, target: Traversal) -> Self {
        self.step(Step::To(target))
    }

    pub fn has_label(self, label: Arg) -> Self {
        self.step(Step::HasLabel(label))
    }

    pub fn has(self, key: Arg, value: Arg) -> Self {
        self.step(Step::Has(key, value))
    }

    pub fn limit(self, n: u32) -> Self {
        self.step(Step::Limit(n))
    }

    pub fn fold(self) -> Self {
        self.step(Step::Fold)
    }

    pub fn unfold(self) -> Self {
        self.step(Step::Unfold)
    }

    pub fn coalesce(self, branches: Vec<Traversal>) -> Self {
        self.step(Step::Coalesce(branches))
    }

    pub fn property(self, key: Arg, value: Arg) -> Self {
        self.step(Step::Property(key, value))
    }

    pub fn value_map(self) -> Self {
        self.step(Step::ValueMap)
    }

    pub fn out_e(self, label: Arg) -> Self {
        self.step(Step::OutE(label))
    }

    pub fn out(self, label: Arg) -> Self {
        self.step(Step::Out(label))
    }

    pub fn group_count_by_label(self) -> Self {
        self.step(Step::GroupCountByLabel)
    }

    pub fn inject(self, n: i64) -> Self {
        self.step(Step::Inject(n))
    }
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.spawned {
            f.write_str("g")?;
        }
        for (i, step) in self.steps.iter().enumerate() {
            if self.spawned || i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

/// A traversal plus the values of every variable it names.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub traversal: Traversal,
    pub bindings: Bindings,
}

impl Query {
    pub fn new(traversal: Traversal) -> Self {
        Self {
            traversal,
            bindings: Bindings::new(),
        }
    }

    pub fn bind(mut self, name: &str, value: impl Into<Json>) -> Self {
        self.bindings.insert(name.to_string(), value.into());
        self
    }

    pub fn bind_all(mut self, bindings: Bindings) -> Self {
        self.bindings.extend(bindings);
        self
    }

    /// The script as sent over the wire.
    pub fn text(&self) -> String {
        self.traversal.to_string()
    }

    /// Bindings rendered for log lines.
    pub fn bindings_text(&self) -> String {
        serde_json::to_string(&self.bindings).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_spawned() {
        let t = Traversal::g()
            .v()
            .has_label(Arg::bind("vLabel"))
            .has(Arg::bind("vKey"), Arg::bind("vValue"));
        assert_eq!(t.to_string(), "g.V().hasLabel(vLabel).has(vKey, vValue)");
    }

    #[test]
    fn test_render_coalesce() {
        let create = Traversal::anonymous()
            .add_v(Arg::bind("vLabel"))
            .property(Arg::literal("pk"), Arg::bind("vPk"));
        let t = Traversal::g()
            .v()
            .limit(1)
            .fold()
            .coalesce(vec![Traversal::anonymous().unfold(), create]);
        assert_eq!(
            t.to_string(),
            "g.V().limit(1).fold().coalesce(unfold(), addV(vLabel).property('pk', vPk))"
        );
    }

    #[test]
    fn test_render_edge_target() {
        let t = Traversal::anonymous()
            .add_e(Arg::bind("edgeLabel"))
            .to(Traversal::g().v_id(Arg::bind("toId")));
        assert_eq!(t.to_string(), "addE(edgeLabel).to(g.V(toId))");
    }

    #[test]
    fn test_query_bindings() {
        let q = Query::new(Traversal::g().v_id(Arg::bind("vId"))).bind("vId", 7);
        assert_eq!(q.text(), "g.V(vId)");
        assert_eq!(q.bindings.get("vId"), Some(&Json::from(7)));
        assert_eq!(q.bindings_text(), r#"{"vId":7}"#);
    }
}
