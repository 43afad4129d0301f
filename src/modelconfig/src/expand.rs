//! Fixed-grid expansion: turn the per-genotype trait-parameter lists into
//! concrete model vectors, honouring the ordering constraints, and cross
//! liability classes when more than one is configured.

use crate::model::{
    Constraint, ConstraintKind, ConstraintOp, GenotypeValues, ModelRange, TraitGenotype,
};

/// One trait-parameter assignment: a value per trait genotype
/// (DD, Dd, dD, dd) for each liability class.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitVector {
    pub per_class: Vec<[f64; 4]>,
}

impl ConstraintOp {
    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            ConstraintOp::Eq => (left - right).abs() < 1.0e-12,
            ConstraintOp::Ne => (left - right).abs() >= 1.0e-12,
            ConstraintOp::Gt => left > right,
            ConstraintOp::Ge => left >= right,
            ConstraintOp::Lt => left < right,
            ConstraintOp::Le => left <= right,
        }
    }
}

/// Expand one parameter (penetrance, mean, ...) into every genotype vector
/// the constraints admit. Without imprinting the dD column mirrors Dd.
/// Constraints naming liability classes apply in the class-crossing step,
/// the rest prune single vectors.
pub fn expand_parameter(
    range: &ModelRange,
    kind: ConstraintKind,
    imprinting: bool,
) -> Vec<TraitVector> {
    let values = match kind {
        ConstraintKind::Penetrance => &range.penetrance,
        ConstraintKind::Mean => &range.mean,
        ConstraintKind::StandardDev => &range.standard_dev,
        ConstraintKind::DegreesOfFreedom => &range.degrees_of_freedom,
    };
    let constraints: Vec<&Constraint> =
        range.constraints.iter().filter(|c| c.kind == kind).collect();
    let in_class: Vec<&&Constraint> =
        constraints.iter().filter(|c| c.left.class.is_none() && c.right.class.is_none()).collect();
    let cross_class: Vec<&&Constraint> =
        constraints.iter().filter(|c| c.left.class.is_some() || c.right.class.is_some()).collect();

    let single: Vec<[f64; 4]> = genotype_vectors(values, imprinting)
        .into_iter()
        .filter(|vector| {
            in_class.iter().all(|c| {
                c.op.holds(vector[c.left.genotype.index()], vector[c.right.genotype.index()])
            })
        })
        .collect();

    if range.liability_classes <= 1 {
        return single.into_iter().map(|v| TraitVector { per_class: vec![v] }).collect();
    }

    // cross the surviving vectors over the liability classes
    let mut expanded: Vec<Vec<[f64; 4]>> = vec![Vec::new()];
    for _ in 0..range.liability_classes {
        let mut next = Vec::with_capacity(expanded.len() * single.len());
        for prefix in &expanded {
            for vector in &single {
                let mut grown = prefix.clone();
                grown.push(*vector);
                next.push(grown);
            }
        }
        expanded = next;
    }
    expanded
        .into_iter()
        .filter(|per_class| {
            cross_class.iter().all(|c| {
                let left_class = c.left.class.unwrap_or(1).saturating_sub(1);
                let right_class = c.right.class.unwrap_or(1).saturating_sub(1);
                if left_class >= per_class.len() || right_class >= per_class.len() {
                    return true;
                }
                c.op.holds(
                    per_class[left_class][c.left.genotype.index()],
                    per_class[right_class][c.right.genotype.index()],
                )
            })
        })
        .map(|per_class| TraitVector { per_class })
        .collect()
}

/// Cartesian product of the per-genotype value lists. Without imprinting
/// a missing dD column is not a free axis: it tracks whatever Dd takes.
fn genotype_vectors(values: &GenotypeValues, imprinting: bool) -> Vec<[f64; 4]> {
    let dd_upper = &values.per_genotype[TraitGenotype::DD.index()];
    let het = &values.per_genotype[TraitGenotype::Dd.index()];
    let het_flipped = &values.per_genotype[TraitGenotype::dD.index()];
    let dd_lower = &values.per_genotype[TraitGenotype::dd.index()];
    let mirror = het_flipped.is_empty() && !imprinting;
    if dd_upper.is_empty() || het.is_empty() || dd_lower.is_empty() {
        return Vec::new();
    }
    if !mirror && het_flipped.is_empty() {
        return Vec::new();
    }

    let mut vectors = Vec::new();
    for &a in dd_upper {
        for &b in het {
            let flipped_choices: &[f64] = if mirror { std::slice::from_ref(&b) } else { het_flipped };
            for &c in flipped_choices {
                for &d in dd_lower {
                    vectors.push([a, b, c, d]);
                }
            }
        }
    }
    vectors
}
