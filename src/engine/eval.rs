//! Memoized, per-pixel evaluation of expression graphs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use approx::abs_diff_eq;
use ndarray::{Array2, Zip};

use crate::types::{DegradError, DegradResult};

use super::image::{BinaryOp, CompareOp, Expr, FitTerm, Image, SeriesReducer, UnaryOp};

/// Materialized pixel data: a value plane plus a validity mask.
#[derive(Debug, Clone)]
pub struct Grid {
    pub values: Array2<f64>,
    pub valid: Array2<bool>,
}

impl Grid {
    pub fn filled(shape: (usize, usize), value: f64) -> Grid {
        Grid {
            values: Array2::from_elem(shape, value),
            valid: Array2::from_elem(shape, true),
        }
    }

    /// All pixels valid, values as given.
    pub fn from_values(values: Array2<f64>) -> Grid {
        let valid = Array2::from_elem(values.dim(), true);
        Grid { values, valid }
    }

    pub fn masked(shape: (usize, usize)) -> Grid {
        Grid {
            values: Array2::zeros(shape),
            valid: Array2::from_elem(shape, false),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Pixel value, `None` when the pixel is invalid.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if self.valid[[row, col]] {
            Some(self.values[[row, col]])
        } else {
            None
        }
    }
}

/// Evaluation session for one analysis extent.
///
/// Every materializing call goes through an `Evaluator`; repeated
/// subtrees are computed once per session.
pub struct Evaluator {
    shape: (usize, usize),
    cache: RefCell<HashMap<usize, Arc<Grid>>>,
}

impl Evaluator {
    pub fn new(shape: (usize, usize)) -> Evaluator {
        Evaluator {
            shape,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Materialize an expression graph into pixel data.
    pub fn materialize(&self, image: &Image) -> DegradResult<Arc<Grid>> {
        let key = Arc::as_ptr(&image.expr) as usize;
        if let Some(grid) = self.cache.borrow().get(&key) {
            return Ok(grid.clone());
        }

        let grid = Arc::new(self.eval(&image.expr)?);
        self.cache.borrow_mut().insert(key, grid.clone());
        Ok(grid)
    }

    fn eval(&self, expr: &Expr) -> DegradResult<Grid> {
        match expr {
            Expr::Constant(v) => Ok(Grid::filled(self.shape, *v)),

            Expr::Source(grid) => {
                if grid.shape() != self.shape {
                    return Err(DegradError::Engine(format!(
                        "source extent {:?} does not match evaluation extent {:?}",
                        grid.shape(),
                        self.shape
                    )));
                }
                Ok((**grid).clone())
            }

            Expr::Binary { op, lhs, rhs } => {
                let a = self.materialize(lhs)?;
                let b = self.materialize(rhs)?;
                Ok(apply_binary(*op, &a, &b))
            }

            Expr::Unary { op, input } => {
                let a = self.materialize(input)?;
                Ok(apply_unary(*op, &a))
            }

            Expr::Compare { op, lhs, rhs } => {
                let a = self.materialize(lhs)?;
                let b = self.materialize(rhs)?;
                Ok(apply_compare(*op, &a, &b))
            }

            Expr::Where { input, test, replacement } => {
                let base = self.materialize(input)?;
                let test = self.materialize(test)?;
                let repl = self.materialize(replacement)?;

                let mut values = base.values.clone();
                let mut valid = base.valid.clone();
                Zip::from(&mut values)
                    .and(&mut valid)
                    .and(&test.values)
                    .and(&test.valid)
                    .and(&repl.values)
                    .and(&repl.valid)
                    .par_for_each(|v, ok, &tv, &tok, &rv, &rok| {
                        if tok && tv != 0.0 {
                            *v = rv;
                            *ok = rok;
                        }
                    });
                Ok(Grid { values, valid })
            }

            Expr::Remap { input, from, to } => {
                let a = self.materialize(input)?;
                let map: HashMap<i64, f64> =
                    from.iter().copied().zip(to.iter().copied()).collect();

                let mut values = Array2::zeros(self.shape);
                let mut valid = Array2::from_elem(self.shape, false);
                Zip::from(&mut values)
                    .and(&mut valid)
                    .and(&a.values)
                    .and(&a.valid)
                    .par_for_each(|v, ok, &av, &aok| {
                        if aok {
                            if let Some(&mapped) = map.get(&(av.round() as i64)) {
                                *v = mapped;
                                *ok = true;
                            }
                        }
                    });
                Ok(Grid { values, valid })
            }

            Expr::UpdateMask { input, mask } => {
                let a = self.materialize(input)?;
                let m = self.materialize(mask)?;

                let mut values = a.values.clone();
                let mut valid = a.valid.clone();
                Zip::from(&mut values)
                    .and(&mut valid)
                    .and(&m.values)
                    .and(&m.valid)
                    .par_for_each(|_, ok, &mv, &mok| {
                        *ok = *ok && mok && mv != 0.0;
                    });
                Ok(Grid { values, valid })
            }

            Expr::Unmask { input, fill } => {
                let a = self.materialize(input)?;
                let fill = *fill;

                let mut values = a.values.clone();
                let mut valid = a.valid.clone();
                Zip::from(&mut values).and(&mut valid).par_for_each(|v, ok| {
                    if !*ok {
                        *v = fill;
                        *ok = true;
                    }
                });
                Ok(Grid { values, valid })
            }

            Expr::SeriesReduce { inputs, reducer } => {
                let grids = inputs
                    .iter()
                    .map(|img| self.materialize(img))
                    .collect::<DegradResult<Vec<_>>>()?;
                Ok(self.reduce_series(&grids, *reducer))
            }

            Expr::LinearFit { xs, ys, term } => {
                let xg = xs
                    .iter()
                    .map(|img| self.materialize(img))
                    .collect::<DegradResult<Vec<_>>>()?;
                let yg = ys
                    .iter()
                    .map(|img| self.materialize(img))
                    .collect::<DegradResult<Vec<_>>>()?;
                Ok(self.linear_fit(&xg, &yg, *term))
            }
        }
    }

    fn reduce_series(&self, grids: &[Arc<Grid>], reducer: SeriesReducer) -> Grid {
        let mut values = Array2::zeros(self.shape);
        let mut valid = Array2::from_elem(self.shape, false);

        Zip::indexed(&mut values).and(&mut valid).par_for_each(|(r, c), v, ok| {
            let series: Vec<f64> = grids.iter().filter_map(|g| g.get(r, c)).collect();
            if let Some(result) = reduce_values(&series, reducer) {
                *v = result;
                *ok = true;
            }
        });
        Grid { values, valid }
    }

    fn linear_fit(&self, xs: &[Arc<Grid>], ys: &[Arc<Grid>], term: FitTerm) -> Grid {
        let mut values = Array2::zeros(self.shape);
        let mut valid = Array2::from_elem(self.shape, false);

        Zip::indexed(&mut values).and(&mut valid).par_for_each(|(r, c), v, ok| {
            let pairs: Vec<(f64, f64)> = xs
                .iter()
                .zip(ys.iter())
                .filter_map(|(xg, yg)| match (xg.get(r, c), yg.get(r, c)) {
                    (Some(x), Some(y)) => Some((x, y)),
                    _ => None,
                })
                .collect();
            if let Some((offset, scale)) = fit_pairs(&pairs) {
                *v = match term {
                    FitTerm::Offset => offset,
                    FitTerm::Scale => scale,
                };
                *ok = true;
            }
        });
        Grid { values, valid }
    }
}

fn apply_binary(op: BinaryOp, a: &Grid, b: &Grid) -> Grid {
    let mut values = Array2::zeros(a.shape());
    let mut valid = Array2::from_elem(a.shape(), false);

    Zip::from(&mut values)
        .and(&mut valid)
        .and(&a.values)
        .and(&a.valid)
        .and(&b.values)
        .and(&b.valid)
        .par_for_each(|v, ok, &av, &aok, &bv, &bok| {
            if !(aok && bok) {
                return;
            }
            match op {
                BinaryOp::Add => {
                    *v = av + bv;
                    *ok = true;
                }
                BinaryOp::Sub => {
                    *v = av - bv;
                    *ok = true;
                }
                BinaryOp::Mul => {
                    *v = av * bv;
                    *ok = true;
                }
                BinaryOp::Div => {
                    if !abs_diff_eq!(bv, 0.0) {
                        *v = av / bv;
                        *ok = true;
                    }
                }
                BinaryOp::Min => {
                    *v = av.min(bv);
                    *ok = true;
                }
                BinaryOp::Max => {
                    *v = av.max(bv);
                    *ok = true;
                }
                BinaryOp::And => {
                    *v = f64::from(av != 0.0 && bv != 0.0);
                    *ok = true;
                }
                BinaryOp::Or => {
                    *v = f64::from(av != 0.0 || bv != 0.0);
                    *ok = true;
                }
                BinaryOp::BitAnd => {
                    *v = ((av as i64) & (bv as i64)) as f64;
                    *ok = true;
                }
            }
        });
    Grid { values, valid }
}

fn apply_unary(op: UnaryOp, a: &Grid) -> Grid {
    let mut values = Array2::zeros(a.shape());
    let mut valid = Array2::from_elem(a.shape(), false);

    Zip::from(&mut values)
        .and(&mut valid)
        .and(&a.values)
        .and(&a.valid)
        .par_for_each(|v, ok, &av, &aok| {
            if !aok {
                return;
            }
            match op {
                UnaryOp::Sqrt => {
                    if av >= 0.0 {
                        *v = av.sqrt();
                        *ok = true;
                    }
                }
                UnaryOp::Abs => {
                    *v = av.abs();
                    *ok = true;
                }
                UnaryOp::Not => {
                    *v = f64::from(av == 0.0);
                    *ok = true;
                }
                UnaryOp::RightShift(bits) => {
                    *v = ((av as i64) >> bits) as f64;
                    *ok = true;
                }
            }
        });
    Grid { values, valid }
}

fn apply_compare(op: CompareOp, a: &Grid, b: &Grid) -> Grid {
    let mut values = Array2::zeros(a.shape());
    let mut valid = Array2::from_elem(a.shape(), false);

    Zip::from(&mut values)
        .and(&mut valid)
        .and(&a.values)
        .and(&a.valid)
        .and(&b.values)
        .and(&b.valid)
        .par_for_each(|v, ok, &av, &aok, &bv, &bok| {
            if !(aok && bok) {
                return;
            }
            let result = match op {
                CompareOp::Eq => av == bv,
                CompareOp::Neq => av != bv,
                CompareOp::Lt => av < bv,
                CompareOp::Lte => av <= bv,
                CompareOp::Gt => av > bv,
                CompareOp::Gte => av >= bv,
            };
            *v = f64::from(result);
            *ok = true;
        });
    Grid { values, valid }
}

fn reduce_values(series: &[f64], reducer: SeriesReducer) -> Option<f64> {
    match reducer {
        SeriesReducer::Mean => {
            if series.is_empty() {
                None
            } else {
                Some(series.iter().sum::<f64>() / series.len() as f64)
            }
        }
        SeriesReducer::StdDev => {
            if series.is_empty() {
                return None;
            }
            let n = series.len() as f64;
            let mean = series.iter().sum::<f64>() / n;
            let var = series.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            Some(var.sqrt())
        }
        SeriesReducer::KendallTau => kendall_tau(series),
    }
}

/// Kendall's rank correlation of a year-ordered series against time.
/// Tied pairs contribute zero.
fn kendall_tau(series: &[f64]) -> Option<f64> {
    let n = series.len();
    if n < 2 {
        return None;
    }
    let mut s = 0i64;
    for i in 0..n - 1 {
        for j in i + 1..n {
            let d = series[j] - series[i];
            if d > 0.0 {
                s += 1;
            } else if d < 0.0 {
                s -= 1;
            }
        }
    }
    let pairs = (n * (n - 1) / 2) as f64;
    Some(s as f64 / pairs)
}

fn fit_pairs(pairs: &[(f64, f64)]) -> Option<(f64, f64)> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let var_x = pairs.iter().map(|(x, _)| (x - mean_x).powi(2)).sum::<f64>();
    if abs_diff_eq!(var_x, 0.0) {
        return None;
    }
    let cov = pairs
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum::<f64>();
    let scale = cov / var_x;
    let offset = mean_y - scale * mean_x;
    Some((offset, scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn image(values: Array2<f64>) -> Image {
        Image::from_grid(Grid::from_values(values))
    }

    #[test]
    fn test_arithmetic_and_masking() {
        let eval = Evaluator::new((2, 2));
        let a = image(array![[1.0, 2.0], [3.0, 4.0]]);
        let b = image(array![[0.0, 1.0], [2.0, 0.0]]);

        let sum = eval.materialize(&a.add(&b)).unwrap();
        assert_eq!(sum.get(1, 0), Some(5.0));

        // division by zero invalidates the pixel
        let ratio = eval.materialize(&a.divide(&b)).unwrap();
        assert_eq!(ratio.get(0, 0), None);
        assert_eq!(ratio.get(0, 1), Some(2.0));

        // unmask restores validity with the fill value
        let filled = eval.materialize(&a.divide(&b).unmask(-1.0)).unwrap();
        assert_eq!(filled.get(0, 0), Some(-1.0));
    }

    #[test]
    fn test_where_keeps_base_when_test_invalid() {
        let eval = Evaluator::new((1, 2));
        let base = Image::constant(0.0);
        let test = image(array![[1.0, 0.0]]).update_mask(image(array![[1.0, 0.0]]));
        let out = eval.materialize(&base.where_(test, 7.0)).unwrap();
        assert_eq!(out.get(0, 0), Some(7.0));
        // invalid test pixel leaves the base untouched
        assert_eq!(out.get(0, 1), Some(0.0));
    }

    #[test]
    fn test_remap_unmapped_is_invalid() {
        let eval = Evaluator::new((1, 3));
        let input = image(array![[10.0, 20.0, 33.0]]);
        let out = eval.materialize(&input.remap(&[10, 20], &[1.0, 2.0])).unwrap();
        assert_eq!(out.get(0, 0), Some(1.0));
        assert_eq!(out.get(0, 1), Some(2.0));
        assert_eq!(out.get(0, 2), None);
    }

    #[test]
    fn test_bit_range() {
        let eval = Evaluator::new((1, 1));
        // bits 2..=3 of 0b1100 are 0b11
        let qa = image(array![[12.0]]);
        let out = eval.materialize(&qa.bit_range(2, 3)).unwrap();
        assert_eq!(out.get(0, 0), Some(3.0));
    }

    #[test]
    fn test_kendall_tau_monotonic_series() {
        assert_eq!(kendall_tau(&[1.0, 2.0, 3.0, 4.0]), Some(1.0));
        assert_eq!(kendall_tau(&[4.0, 3.0, 2.0, 1.0]), Some(-1.0));
        assert_eq!(kendall_tau(&[2.0]), None);
    }

    #[test]
    fn test_linear_fit_recovers_line() {
        let (offset, scale) = fit_pairs(&[(1.0, 3.0), (2.0, 5.0), (3.0, 7.0)]).unwrap();
        approx::assert_relative_eq!(scale, 2.0, max_relative = 1e-12);
        approx::assert_relative_eq!(offset, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn test_memoized_subtree_evaluated_once() {
        let eval = Evaluator::new((1, 1));
        let a = image(array![[2.0]]);
        let shared = a.multiply(3.0);
        let expr = shared.add(&shared);
        let out = eval.materialize(&expr).unwrap();
        assert_eq!(out.get(0, 0), Some(12.0));
        // the shared node is cached
        assert!(eval.cache.borrow().len() >= 2);
    }
}
