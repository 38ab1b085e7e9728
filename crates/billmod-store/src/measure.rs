use billmod_types::{Error, Result};
use std::collections::HashMap;

/// What to do when no conversion path links two measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureMode {
    /// No path is an error (`not_found_relation_for_measure`).
    Strict,
    /// No path yields a conversion factor of 0.0.
    Lenient,
}

/// One row of the measure table: how many of the lesser measure make up this
/// one, and which measure that is.
#[derive(Debug, Clone, Default)]
pub(crate) struct MeasureLink {
    pub relation: i64,
    pub less: String,
}

// Cycle guard, shared between both walk directions.
const MAX_STEPS: usize = 50;

/// Conversion factor from `from` to `to` along the `lessmeasure` chain.
///
/// Measures form chains like year -> month -> day, each link holding the
/// multiplier to the lesser unit. Walking down from `from` multiplies the
/// relations; when `to` is not downstream, the reciprocal is found by walking
/// down from `to` and dividing.
pub(crate) fn relation_between(
    map: &HashMap<String, MeasureLink>,
    from: &str,
    to: &str,
    mode: MeasureMode,
) -> Result<f64> {
    let mut steps = 0usize;
    let mut step = |steps: &mut usize| -> Result<()> {
        *steps += 1;
        if *steps >= MAX_STEPS {
            return Err(Error::with_value("internal", "measure_relation", "max_steps"));
        }
        Ok(())
    };

    let mut rel = 1.0f64;
    let mut curr = from;
    while let Some(link) = map.get(curr) {
        if link.less.is_empty() || curr == to {
            break;
        }
        rel *= link.relation as f64;
        curr = &link.less;
        step(&mut steps)?;
    }
    if curr == to {
        return Ok(rel);
    }

    rel = 1.0;
    curr = to;
    while let Some(link) = map.get(curr) {
        if link.less.is_empty() || curr == from {
            break;
        }
        if link.relation == 0 {
            return Err(Error::with_value(
                "internal",
                "measure_relation",
                "zero_relation",
            ));
        }
        rel /= link.relation as f64;
        curr = &link.less;
        step(&mut steps)?;
    }
    if curr == from {
        return Ok(rel);
    }

    match mode {
        MeasureMode::Strict => Err(Error::new("not_found_relation_for_measure")
            .add_param("from", from)
            .add_param("to", to)),
        MeasureMode::Lenient => Ok(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> HashMap<String, MeasureLink> {
        let mut map = HashMap::new();
        map.insert(
            "year".to_string(),
            MeasureLink {
                relation: 12,
                less: "month".to_string(),
            },
        );
        map.insert(
            "month".to_string(),
            MeasureLink {
                relation: 30,
                less: "day".to_string(),
            },
        );
        map.insert(
            "day".to_string(),
            MeasureLink {
                relation: 0,
                less: String::new(),
            },
        );
        map.insert(
            "byte".to_string(),
            MeasureLink {
                relation: 0,
                less: String::new(),
            },
        );
        map
    }

    #[test]
    fn downstream_multiplies() {
        let map = chain();
        let rel = relation_between(&map, "year", "day", MeasureMode::Strict).unwrap();
        assert_eq!(rel, 360.0);
    }

    #[test]
    fn upstream_is_reciprocal() {
        let map = chain();
        let down = relation_between(&map, "year", "month", MeasureMode::Strict).unwrap();
        let up = relation_between(&map, "month", "year", MeasureMode::Strict).unwrap();
        assert_eq!(down, 12.0);
        assert_eq!(up, 1.0 / 12.0);
    }

    #[test]
    fn same_measure_is_identity() {
        let map = chain();
        let rel = relation_between(&map, "month", "month", MeasureMode::Strict).unwrap();
        assert_eq!(rel, 1.0);
    }

    #[test]
    fn no_path_strict_errors() {
        let map = chain();
        let err = relation_between(&map, "year", "byte", MeasureMode::Strict).unwrap_err();
        assert_eq!(err.kind(), "not_found_relation_for_measure");
        assert_eq!(
            err.params(),
            [
                ("from".to_string(), "year".to_string()),
                ("to".to_string(), "byte".to_string())
            ]
        );
    }

    #[test]
    fn no_path_lenient_is_zero() {
        let map = chain();
        let rel = relation_between(&map, "year", "byte", MeasureMode::Lenient).unwrap();
        assert_eq!(rel, 0.0);
    }

    #[test]
    fn unknown_measure_behaves_as_no_path() {
        let map = chain();
        let rel = relation_between(&map, "fortnight", "day", MeasureMode::Lenient).unwrap();
        assert_eq!(rel, 0.0);
    }

    #[test]
    fn cycle_is_cut_off() {
        let mut map = HashMap::new();
        map.insert(
            "a".to_string(),
            MeasureLink {
                relation: 2,
                less: "b".to_string(),
            },
        );
        map.insert(
            "b".to_string(),
            MeasureLink {
                relation: 2,
                less: "a".to_string(),
            },
        );
        let err = relation_between(&map, "a", "c", MeasureMode::Strict).unwrap_err();
        assert_eq!(err.kind(), "internal");
        assert_eq!(err.value(), "max_steps");
    }

    #[test]
    fn zero_relation_in_divide_walk_errors() {
        let mut map = chain();
        map.get_mut("month").unwrap().relation = 0;
        let err = relation_between(&map, "day", "month", MeasureMode::Strict).unwrap_err();
        assert_eq!(err.value(), "zero_relation");
    }
}
