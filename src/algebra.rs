//! Algebra tree: the closed set of operator kinds
//!
//! The parser/translator (outside this crate) produces an [`Algebra`] tree;
//! [`crate::eval::build_operator`] dispatches over it to build the operator
//! pipeline. Using a closed enum rather than per-node trait objects keeps
//! the operator set exhaustively checkable.

use crate::aggregate::AggregateSpec;
use crate::error::{QueryError, Result};
use crate::expr::BoxedExpression;
use crate::pattern::TriplePattern;
use crate::term::Term;
use crate::var_registry::{VarId, VarRegistry};
use std::sync::Arc;

/// One grouping level: an output variable carrying either an evaluated key
/// expression or the raw value of the variable itself
#[derive(Clone)]
pub struct GroupKey {
    pub var: VarId,
    pub expr: Option<BoxedExpression>,
}

/// One ORDER BY level
#[derive(Clone)]
pub struct SortKey {
    pub expr: BoxedExpression,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(expr: BoxedExpression) -> Self {
        Self {
            expr,
            descending: false,
        }
    }

    pub fn desc(expr: BoxedExpression) -> Self {
        Self {
            expr,
            descending: true,
        }
    }

    /// Ascending sort on a plain variable
    pub fn by_var(var: VarId) -> Self {
        Self::asc(Arc::new(crate::expr::VarExpr(var)))
    }
}

/// Projection mode for SELECT
#[derive(Clone)]
pub enum Projection {
    /// Pass all variables through, stripping planner-synthesized helpers
    All,
    /// Rewrite to exactly the declared variables; entries with an
    /// expression are `(expr AS ?var)` projections
    Vars(Vec<(VarId, Option<BoxedExpression>)>),
}

/// The graph term of a GRAPH clause
#[derive(Clone)]
pub enum GraphTerm {
    /// Fixed named graph
    Named(Arc<str>),
    /// Graph variable: uses its binding when already determined, otherwise
    /// iterates the dataset's named graphs rebinding the variable
    Var(VarId),
}

/// A SPARQL algebra node
#[derive(Clone)]
pub enum Algebra {
    /// Leaf triple pattern matched against the active graph
    Pattern(TriplePattern),
    /// Inline solution sequence (VALUES)
    Values {
        vars: Vec<VarId>,
        rows: Vec<Vec<Option<Term>>>,
    },
    /// Inner hash join; degrades to a cross product when the operands share
    /// no variables
    Join(Box<Algebra>, Box<Algebra>),
    /// Left (OPTIONAL) join with an optional post-join filter expression
    LeftJoin {
        left: Box<Algebra>,
        right: Box<Algebra>,
        filter: Option<BoxedExpression>,
    },
    /// Anti-join (MINUS)
    Minus(Box<Algebra>, Box<Algebra>),
    /// Correlated nested-loop join: the right side is re-evaluated per left
    /// solution with that solution's values substituted. `optional` selects
    /// left-join semantics (emit the left row when the right is empty).
    NestedJoin {
        left: Box<Algebra>,
        right: Box<Algebra>,
        optional: bool,
    },
    /// UNION of two operands
    Union(Box<Algebra>, Box<Algebra>),
    /// FILTER (and HAVING, when applied above Group)
    Filter {
        input: Box<Algebra>,
        expr: BoxedExpression,
    },
    /// Extend/BIND: adds one computed variable. `strict` selects BIND
    /// semantics (assigning to a present variable is a query error);
    /// non-strict Extend leaves the variable unbound on failure.
    Extend {
        input: Box<Algebra>,
        var: VarId,
        expr: BoxedExpression,
        strict: bool,
    },
    /// GROUP BY + aggregation
    Group {
        input: Box<Algebra>,
        keys: Vec<GroupKey>,
        aggregates: Vec<AggregateSpec>,
    },
    /// ORDER BY
    OrderBy {
        input: Box<Algebra>,
        keys: Vec<SortKey>,
    },
    /// SELECT projection
    Project {
        input: Box<Algebra>,
        projection: Projection,
    },
    /// DISTINCT
    Distinct(Box<Algebra>),
    /// REDUCED: adjacent-duplicate elimination only
    Reduced(Box<Algebra>),
    /// OFFSET/LIMIT
    Slice {
        input: Box<Algebra>,
        offset: usize,
        limit: Option<usize>,
    },
    /// GRAPH scope
    Graph {
        input: Box<Algebra>,
        graph: GraphTerm,
    },
    /// Sub-select scope: the inner tree is evaluated without the outer seed
    /// binding and projected to its declared variables
    SubSelect {
        input: Box<Algebra>,
        vars: Vec<VarId>,
    },
}

impl Algebra {
    /// Output variables of this node, in first-occurrence order
    pub fn out_vars(&self, reg: &VarRegistry) -> Vec<VarId> {
        let mut out = Vec::new();
        self.collect_out_vars(reg, &mut out);
        out
    }

    fn collect_out_vars(&self, reg: &VarRegistry, out: &mut Vec<VarId>) {
        let mut push = |v: VarId, out: &mut Vec<VarId>| {
            if !out.contains(&v) {
                out.push(v);
            }
        };
        match self {
            Algebra::Pattern(p) => {
                for v in p.variables() {
                    push(v, out);
                }
            }
            Algebra::Values { vars, .. } => {
                for &v in vars {
                    push(v, out);
                }
            }
            Algebra::Join(l, r)
            | Algebra::Union(l, r)
            | Algebra::LeftJoin {
                left: l, right: r, ..
            }
            | Algebra::NestedJoin {
                left: l, right: r, ..
            } => {
                l.collect_out_vars(reg, out);
                r.collect_out_vars(reg, out);
            }
            Algebra::Minus(l, _) => l.collect_out_vars(reg, out),
            Algebra::Filter { input, .. }
            | Algebra::OrderBy { input, .. }
            | Algebra::Distinct(input)
            | Algebra::Reduced(input)
            | Algebra::Slice { input, .. } => input.collect_out_vars(reg, out),
            Algebra::Extend { input, var, .. } => {
                input.collect_out_vars(reg, out);
                push(*var, out);
            }
            Algebra::Group {
                keys, aggregates, ..
            } => {
                for key in keys {
                    push(key.var, out);
                }
                for agg in aggregates {
                    push(agg.output_var, out);
                }
            }
            Algebra::Project { input, projection } => match projection {
                Projection::All => {
                    let mut inner = Vec::new();
                    input.collect_out_vars(reg, &mut inner);
                    for v in inner {
                        if !reg.is_synthetic(v) {
                            push(v, out);
                        }
                    }
                }
                Projection::Vars(entries) => {
                    for (v, _) in entries {
                        push(*v, out);
                    }
                }
            },
            Algebra::Graph { input, graph } => {
                input.collect_out_vars(reg, out);
                if let GraphTerm::Var(v) = graph {
                    push(*v, out);
                }
            }
            Algebra::SubSelect { vars, .. } => {
                for &v in vars {
                    push(v, out);
                }
            }
        }
    }

    /// Clone the tree with the binding's values substituted into every leaf
    /// triple pattern. Used by the correlated loop join to parameterize its
    /// right side per left element.
    ///
    /// Sub-select scopes are left untouched: they evaluate without the
    /// outer seed by definition.
    pub fn seed(&self, binding: &crate::binding::BindingSet) -> Algebra {
        match self {
            Algebra::Pattern(p) => Algebra::Pattern(p.bind(binding)),
            Algebra::Values { .. } | Algebra::SubSelect { .. } => self.clone(),
            Algebra::Join(l, r) => {
                Algebra::Join(Box::new(l.seed(binding)), Box::new(r.seed(binding)))
            }
            Algebra::LeftJoin {
                left,
                right,
                filter,
            } => Algebra::LeftJoin {
                left: Box::new(left.seed(binding)),
                right: Box::new(right.seed(binding)),
                filter: filter.clone(),
            },
            Algebra::Minus(l, r) => {
                Algebra::Minus(Box::new(l.seed(binding)), Box::new(r.seed(binding)))
            }
            Algebra::NestedJoin {
                left,
                right,
                optional,
            } => Algebra::NestedJoin {
                left: Box::new(left.seed(binding)),
                right: right.clone(),
                optional: *optional,
            },
            Algebra::Union(l, r) => {
                Algebra::Union(Box::new(l.seed(binding)), Box::new(r.seed(binding)))
            }
            Algebra::Filter { input, expr } => Algebra::Filter {
                input: Box::new(input.seed(binding)),
                expr: expr.clone(),
            },
            Algebra::Extend {
                input,
                var,
                expr,
                strict,
            } => Algebra::Extend {
                input: Box::new(input.seed(binding)),
                var: *var,
                expr: expr.clone(),
                strict: *strict,
            },
            Algebra::Group {
                input,
                keys,
                aggregates,
            } => Algebra::Group {
                input: Box::new(input.seed(binding)),
                keys: keys.clone(),
                aggregates: aggregates.clone(),
            },
            Algebra::OrderBy { input, keys } => Algebra::OrderBy {
                input: Box::new(input.seed(binding)),
                keys: keys.clone(),
            },
            Algebra::Project { input, projection } => Algebra::Project {
                input: Box::new(input.seed(binding)),
                projection: projection.clone(),
            },
            Algebra::Distinct(input) => Algebra::Distinct(Box::new(input.seed(binding))),
            Algebra::Reduced(input) => Algebra::Reduced(Box::new(input.seed(binding))),
            Algebra::Slice {
                input,
                offset,
                limit,
            } => Algebra::Slice {
                input: Box::new(input.seed(binding)),
                offset: *offset,
                limit: *limit,
            },
            Algebra::Graph { input, graph } => Algebra::Graph {
                input: Box::new(input.seed(binding)),
                graph: graph.clone(),
            },
        }
    }

    /// Validate the tree before evaluation.
    ///
    /// Structural/contract errors (spec-visible query errors that do not
    /// depend on data) fail here, fast and clearly, rather than surfacing
    /// mid-stream: double assignment via strict BIND, aggregate outputs
    /// colliding with group keys, duplicate or dangling projections.
    pub fn validate(&self, reg: &VarRegistry) -> Result<()> {
        match self {
            Algebra::Pattern(_) => Ok(()),
            Algebra::Values { vars, rows } => {
                for row in rows {
                    if row.len() != vars.len() {
                        return Err(QueryError::InvalidQuery(format!(
                            "VALUES row arity {} does not match {} variables",
                            row.len(),
                            vars.len()
                        )));
                    }
                }
                Ok(())
            }
            Algebra::Join(l, r)
            | Algebra::Union(l, r)
            | Algebra::Minus(l, r)
            | Algebra::LeftJoin {
                left: l, right: r, ..
            }
            | Algebra::NestedJoin {
                left: l, right: r, ..
            } => {
                l.validate(reg)?;
                r.validate(reg)
            }
            Algebra::Filter { input, .. }
            | Algebra::OrderBy { input, .. }
            | Algebra::Distinct(input)
            | Algebra::Reduced(input)
            | Algebra::Slice { input, .. }
            | Algebra::Graph { input, .. } => input.validate(reg),
            Algebra::Extend {
                input, var, strict, ..
            } => {
                input.validate(reg)?;
                if *strict && input.out_vars(reg).contains(var) {
                    return Err(QueryError::VariableAlreadyBound(
                        reg.try_name(*var).unwrap_or("?").to_string(),
                    ));
                }
                Ok(())
            }
            Algebra::Group {
                input,
                keys,
                aggregates,
            } => {
                input.validate(reg)?;
                for agg in aggregates {
                    if keys.iter().any(|k| k.var == agg.output_var) {
                        return Err(QueryError::InvalidQuery(format!(
                            "aggregate output {} collides with a group key",
                            reg.try_name(agg.output_var).unwrap_or("?")
                        )));
                    }
                }
                Ok(())
            }
            Algebra::Project { input, projection } => {
                input.validate(reg)?;
                if let Projection::Vars(entries) = projection {
                    for (i, (v, _)) in entries.iter().enumerate() {
                        if entries[..i].iter().any(|(other, _)| other == v) {
                            return Err(QueryError::InvalidQuery(format!(
                                "duplicate projection variable {}",
                                reg.try_name(*v).unwrap_or("?")
                            )));
                        }
                    }
                }
                Ok(())
            }
            Algebra::SubSelect { input, vars } => {
                input.validate(reg)?;
                let inner = input.out_vars(reg);
                for v in vars {
                    if !inner.contains(v) {
                        return Err(QueryError::InvalidQuery(format!(
                            "sub-select projects {} which its body does not bind",
                            reg.try_name(*v).unwrap_or("?")
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}
