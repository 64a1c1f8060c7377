use anyhow::anyhow;
use roots::{find_root_brent, SimpleConvergency};

/// Root of `func` within `[a, b]` using Brent's method, or `None` when the function does not
/// change sign over the bracket.
pub(crate) fn brent_in_bracket(
    func: impl Fn(f64) -> f64,
    a: f64,
    b: f64,
    xtol: f64,
) -> anyhow::Result<Option<f64>> {
    let (fa, fb) = (func(a), func(b));
    if fa == 0. {
        return Ok(Some(a));
    }
    if fb == 0. {
        return Ok(Some(b));
    }
    if fa.signum() == fb.signum() {
        return Ok(None);
    }

    let mut convergency = SimpleConvergency {
        eps: xtol,
        max_iter: 100, // default for brentq in scipy
    };

    find_root_brent::<f64, _>(a, b, func, &mut convergency)
        .map(Some)
        .map_err(|e| anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_brent_in_bracket() {
        let root = brent_in_bracket(|x| x * x - 2., 0., 2., 1e-9).unwrap();
        assert_relative_eq!(root.unwrap(), 2f64.sqrt(), max_relative = 1e-6);
    }

    #[test]
    fn test_brent_without_sign_change() {
        assert_eq!(brent_in_bracket(|x| x * x + 1., -1., 1., 1e-9).unwrap(), None);
    }
}
