//! Algebra-to-operator dispatch and query drivers
//!
//! [`build_operator`] compiles an [`Algebra`] tree into the operator
//! pipeline; [`open_pipeline`] validates, builds and opens it;
//! [`execute`]/[`ask`] are convenience drivers on top.

use crate::algebra::{Algebra, GraphTerm};
use crate::bind::ExtendOperator;
use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::distinct::{DistinctOperator, ReducedOperator};
use crate::error::Result;
use crate::filter::FilterOperator;
use crate::graph::GraphOperator;
use crate::groupby::GroupByOperator;
use crate::join::{
    merged_schema, shared_vars, BidirectionalJoin, HashJoinSink, LeftJoinSink, LoopJoinOperator,
    MinusSink,
};
use crate::operator::BoxedOperator;
use crate::project::ProjectOperator;
use crate::scan::PatternScanOperator;
use crate::slice::SliceOperator;
use crate::sort::OrderByOperator;
use crate::subquery::SubSelectOperator;
use crate::union::UnionOperator;
use crate::values::ValuesOperator;
use crate::var_registry::{VarId, VarRegistry};
use tracing::debug;

/// Compile one algebra node (and its subtree) into an operator
pub fn build_operator(algebra: &Algebra, reg: &VarRegistry) -> Result<BoxedOperator> {
    Ok(match algebra {
        Algebra::Pattern(pattern) => Box::new(PatternScanOperator::new(pattern.clone())),
        Algebra::Values { vars, rows } => {
            Box::new(ValuesOperator::new(vars.clone(), rows.clone()))
        }
        Algebra::Join(l, r) => {
            let left = build_operator(l, reg)?;
            let right = build_operator(r, reg)?;
            let join_vars = shared_vars(left.schema(), right.schema());
            let schema = merged_schema(left.schema(), right.schema());
            Box::new(BidirectionalJoin::new(
                "join",
                schema,
                left,
                right,
                HashJoinSink::new(join_vars),
            ))
        }
        Algebra::LeftJoin {
            left,
            right,
            filter,
        } => {
            let left = build_operator(left, reg)?;
            let right = build_operator(right, reg)?;
            let join_vars = shared_vars(left.schema(), right.schema());
            let right_only: Vec<VarId> = right
                .schema()
                .iter()
                .copied()
                .filter(|v| !left.schema().contains(v))
                .collect();
            let schema = merged_schema(left.schema(), right.schema());
            Box::new(BidirectionalJoin::new(
                "left-join",
                schema,
                left,
                right,
                LeftJoinSink::new(join_vars, right_only, filter.clone()),
            ))
        }
        Algebra::Minus(l, r) => {
            let left = build_operator(l, reg)?;
            let right = build_operator(r, reg)?;
            let schema = left.schema().to_vec();
            Box::new(BidirectionalJoin::new(
                "minus",
                schema,
                left,
                right,
                MinusSink::new(),
            ))
        }
        Algebra::NestedJoin {
            left,
            right,
            optional,
        } => {
            let left = build_operator(left, reg)?;
            let right_vars = right.out_vars(reg);
            let right_only: Vec<VarId> = right_vars
                .iter()
                .copied()
                .filter(|v| !left.schema().contains(v))
                .collect();
            let schema = merged_schema(left.schema(), &right_vars);
            Box::new(LoopJoinOperator::new(
                schema,
                left,
                (**right).clone(),
                right_only,
                *optional,
            ))
        }
        Algebra::Union(l, r) => {
            let left = build_operator(l, reg)?;
            let right = build_operator(r, reg)?;
            Box::new(UnionOperator::new(left, right))
        }
        Algebra::Filter { input, expr } => {
            Box::new(FilterOperator::new(build_operator(input, reg)?, expr.clone()))
        }
        Algebra::Extend {
            input,
            var,
            expr,
            strict,
        } => Box::new(ExtendOperator::new(
            build_operator(input, reg)?,
            *var,
            expr.clone(),
            *strict,
        )),
        Algebra::Group {
            input,
            keys,
            aggregates,
        } => Box::new(GroupByOperator::new(
            build_operator(input, reg)?,
            keys.clone(),
            aggregates.clone(),
        )),
        Algebra::OrderBy { input, keys } => Box::new(OrderByOperator::new(
            build_operator(input, reg)?,
            keys.clone(),
            None,
        )),
        Algebra::Project { input, projection } => Box::new(ProjectOperator::new(
            build_operator(input, reg)?,
            projection.clone(),
            reg,
        )),
        Algebra::Distinct(input) => Box::new(DistinctOperator::new(build_operator(input, reg)?)),
        Algebra::Reduced(input) => Box::new(ReducedOperator::new(build_operator(input, reg)?)),
        Algebra::Slice {
            input,
            offset,
            limit,
        } => {
            let bound = limit.and_then(|l| offset.checked_add(l));
            Box::new(SliceOperator::new(
                build_slice_input(input, reg, bound)?,
                *offset,
                *limit,
            ))
        }
        Algebra::Graph { input, graph } => match graph {
            GraphTerm::Named(name) => {
                Box::new(GraphOperator::named(name.clone(), build_operator(input, reg)?))
            }
            GraphTerm::Var(var) => {
                let mut schema = input.out_vars(reg);
                if !schema.contains(var) {
                    schema.push(*var);
                }
                Box::new(GraphOperator::var(*var, (**input).clone(), schema))
            }
        },
        Algebra::SubSelect { input, vars } => Box::new(SubSelectOperator::new(
            build_operator(input, reg)?,
            vars.clone(),
        )),
    })
}

/// Build the child of a Slice, handing the slice's result-size bound
/// (offset + limit) to an ORDER BY sitting directly beneath it, looked
/// through cardinality-preserving wrappers only. The bound goes to that
/// one operator; anything deeper (sub-selects, nested scopes, join
/// operands) is built normally, so an inner sort is never truncated by an
/// outer slice. Distinct/Reduced change cardinality and block the bound.
fn build_slice_input(
    algebra: &Algebra,
    reg: &VarRegistry,
    bound: Option<usize>,
) -> Result<BoxedOperator> {
    if bound.is_none() {
        return build_operator(algebra, reg);
    }
    Ok(match algebra {
        Algebra::OrderBy { input, keys } => Box::new(OrderByOperator::new(
            build_operator(input, reg)?,
            keys.clone(),
            bound,
        )),
        Algebra::Project { input, projection } => Box::new(ProjectOperator::new(
            build_slice_input(input, reg, bound)?,
            projection.clone(),
            reg,
        )),
        other => build_operator(other, reg)?,
    })
}

/// Validate, build and open the pipeline for an algebra tree.
///
/// The caller pulls rows with [`crate::operator::Operator::next`] and must
/// call `close` when done (or cancel the context token to stop early).
pub async fn open_pipeline(algebra: &Algebra, ctx: &EvalContext) -> Result<(BoxedOperator, EvalContext)> {
    algebra.validate(&ctx.vars)?;
    let ctx = ctx.clone();
    let mut root = build_operator(algebra, &ctx.vars)?;
    debug!(schema_len = root.schema().len(), "pipeline opened");
    root.open(&ctx).await?;
    Ok((root, ctx))
}

/// Evaluate a SELECT-style tree to completion
pub async fn execute(algebra: &Algebra, ctx: &EvalContext) -> Result<Vec<BindingSet>> {
    let (mut root, ctx) = open_pipeline(algebra, ctx).await?;
    let mut results = Vec::new();
    while let Some(binding) = root.next(&ctx).await? {
        results.push(binding);
    }
    root.close();
    Ok(results)
}

/// Evaluate an ASK: true iff the tree yields at least one solution.
/// Stops pulling after the first row.
pub async fn ask(algebra: &Algebra, ctx: &EvalContext) -> Result<bool> {
    let (mut root, ctx) = open_pipeline(algebra, ctx).await?;
    let found = root.next(&ctx).await?.is_some();
    root.close();
    Ok(found)
}
