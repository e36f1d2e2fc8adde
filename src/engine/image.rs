//! Lazy raster expression handles.
//!
//! An [`Image`] is an immutable handle to an unevaluated map-algebra
//! expression. Combinator calls never touch pixel data; they build a
//! new node on top of the existing graph. Only the
//! [`Evaluator`](super::Evaluator) materializes pixels, and shared
//! subtrees are evaluated once.

use std::sync::Arc;

use super::eval::Grid;

#[derive(Debug, Clone)]
pub struct Image {
    pub(crate) expr: Arc<Expr>,
}

#[derive(Debug)]
pub(crate) enum Expr {
    Constant(f64),
    Source(Arc<Grid>),
    Binary {
        op: BinaryOp,
        lhs: Image,
        rhs: Image,
    },
    Unary {
        op: UnaryOp,
        input: Image,
    },
    Compare {
        op: CompareOp,
        lhs: Image,
        rhs: Image,
    },
    /// Replace pixels of `input` by `replacement` where `test` is valid
    /// and nonzero.
    Where {
        input: Image,
        test: Image,
        replacement: Image,
    },
    /// Integer lookup; pixels whose rounded value is not a key become
    /// invalid.
    Remap {
        input: Image,
        from: Vec<i64>,
        to: Vec<f64>,
    },
    /// Keep pixels where `mask` is valid and nonzero.
    UpdateMask {
        input: Image,
        mask: Image,
    },
    /// Fill invalid pixels with a constant, making them valid.
    Unmask {
        input: Image,
        fill: f64,
    },
    /// Per-pixel reduction across a year-ordered series.
    SeriesReduce {
        inputs: Vec<Image>,
        reducer: SeriesReducer,
    },
    /// Per-pixel ordinary least squares of `ys` on `xs`.
    LinearFit {
        xs: Vec<Image>,
        ys: Vec<Image>,
        term: FitTerm,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    And,
    Or,
    BitAnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Sqrt,
    Abs,
    Not,
    RightShift(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeriesReducer {
    Mean,
    StdDev,
    KendallTau,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FitTerm {
    Offset,
    Scale,
}

/// Operand conversion so combinators accept images and plain numbers
/// alike.
pub trait ToImage {
    fn to_image(self) -> Image;
}

impl ToImage for Image {
    fn to_image(self) -> Image {
        self
    }
}

impl ToImage for &Image {
    fn to_image(self) -> Image {
        self.clone()
    }
}

impl ToImage for f64 {
    fn to_image(self) -> Image {
        Image::constant(self)
    }
}

impl ToImage for i64 {
    fn to_image(self) -> Image {
        Image::constant(self as f64)
    }
}

impl Image {
    fn node(expr: Expr) -> Image {
        Image { expr: Arc::new(expr) }
    }

    /// Constant-valued image, valid everywhere.
    pub fn constant(value: f64) -> Image {
        Image::node(Expr::Constant(value))
    }

    /// Image invalid at every pixel.
    pub fn fully_masked() -> Image {
        let zero = Image::constant(0.0);
        zero.update_mask(Image::constant(0.0))
    }

    /// Wrap materialized pixel data as an expression leaf.
    pub fn from_grid(grid: Grid) -> Image {
        Image::node(Expr::Source(Arc::new(grid)))
    }

    fn binary<T: ToImage>(&self, op: BinaryOp, rhs: T) -> Image {
        Image::node(Expr::Binary { op, lhs: self.clone(), rhs: rhs.to_image() })
    }

    fn unary(&self, op: UnaryOp) -> Image {
        Image::node(Expr::Unary { op, input: self.clone() })
    }

    fn compare<T: ToImage>(&self, op: CompareOp, rhs: T) -> Image {
        Image::node(Expr::Compare { op, lhs: self.clone(), rhs: rhs.to_image() })
    }

    pub fn add<T: ToImage>(&self, rhs: T) -> Image {
        self.binary(BinaryOp::Add, rhs)
    }

    pub fn subtract<T: ToImage>(&self, rhs: T) -> Image {
        self.binary(BinaryOp::Sub, rhs)
    }

    pub fn multiply<T: ToImage>(&self, rhs: T) -> Image {
        self.binary(BinaryOp::Mul, rhs)
    }

    /// Division; pixels with a zero divisor become invalid.
    pub fn divide<T: ToImage>(&self, rhs: T) -> Image {
        self.binary(BinaryOp::Div, rhs)
    }

    pub fn min<T: ToImage>(&self, rhs: T) -> Image {
        self.binary(BinaryOp::Min, rhs)
    }

    pub fn max<T: ToImage>(&self, rhs: T) -> Image {
        self.binary(BinaryOp::Max, rhs)
    }

    /// Logical conjunction of nonzero pixels, 1/0 valued.
    pub fn and<T: ToImage>(&self, rhs: T) -> Image {
        self.binary(BinaryOp::And, rhs)
    }

    pub fn or<T: ToImage>(&self, rhs: T) -> Image {
        self.binary(BinaryOp::Or, rhs)
    }

    /// Bitwise AND against an integer mask, for QA flag decoding.
    pub fn bitwise_and(&self, mask: i64) -> Image {
        self.binary(BinaryOp::BitAnd, mask)
    }

    pub fn right_shift(&self, bits: u32) -> Image {
        self.unary(UnaryOp::RightShift(bits))
    }

    /// Extract bits `start..=end` of an integer-valued band.
    pub fn bit_range(&self, start: u32, end: u32) -> Image {
        let width = end - start + 1;
        let mask = (1i64 << width) - 1;
        self.right_shift(start).bitwise_and(mask)
    }

    pub fn sqrt(&self) -> Image {
        self.unary(UnaryOp::Sqrt)
    }

    pub fn abs(&self) -> Image {
        self.unary(UnaryOp::Abs)
    }

    /// Logical negation: 1 where the pixel is zero, 0 elsewhere.
    pub fn not(&self) -> Image {
        self.unary(UnaryOp::Not)
    }

    pub fn eq<T: ToImage>(&self, rhs: T) -> Image {
        self.compare(CompareOp::Eq, rhs)
    }

    pub fn neq<T: ToImage>(&self, rhs: T) -> Image {
        self.compare(CompareOp::Neq, rhs)
    }

    pub fn lt<T: ToImage>(&self, rhs: T) -> Image {
        self.compare(CompareOp::Lt, rhs)
    }

    pub fn lte<T: ToImage>(&self, rhs: T) -> Image {
        self.compare(CompareOp::Lte, rhs)
    }

    pub fn gt<T: ToImage>(&self, rhs: T) -> Image {
        self.compare(CompareOp::Gt, rhs)
    }

    pub fn gte<T: ToImage>(&self, rhs: T) -> Image {
        self.compare(CompareOp::Gte, rhs)
    }

    /// Conditional replacement: where `test` is valid and nonzero the
    /// pixel takes `replacement`, elsewhere it is left untouched.
    pub fn where_<T: ToImage, R: ToImage>(&self, test: T, replacement: R) -> Image {
        Image::node(Expr::Where {
            input: self.clone(),
            test: test.to_image(),
            replacement: replacement.to_image(),
        })
    }

    /// Integer lookup. Pixels are rounded before the key match;
    /// unmapped pixels become invalid, never a default class.
    pub fn remap(&self, from: &[i64], to: &[f64]) -> Image {
        debug_assert_eq!(from.len(), to.len());
        Image::node(Expr::Remap {
            input: self.clone(),
            from: from.to_vec(),
            to: to.to_vec(),
        })
    }

    pub fn update_mask<T: ToImage>(&self, mask: T) -> Image {
        Image::node(Expr::UpdateMask { input: self.clone(), mask: mask.to_image() })
    }

    pub fn unmask(&self, fill: f64) -> Image {
        Image::node(Expr::Unmask { input: self.clone(), fill })
    }

    pub(crate) fn series_reduce(inputs: Vec<Image>, reducer: SeriesReducer) -> Image {
        Image::node(Expr::SeriesReduce { inputs, reducer })
    }

    pub(crate) fn linear_fit_term(xs: Vec<Image>, ys: Vec<Image>, term: FitTerm) -> Image {
        Image::node(Expr::LinearFit { xs, ys, term })
    }
}

/// Offset and slope of a per-pixel linear regression.
#[derive(Debug, Clone)]
pub struct LinearFit {
    pub offset: Image,
    pub scale: Image,
}

impl LinearFit {
    /// Fit `y = offset + scale * x` per pixel over paired series.
    pub fn fit(pairs: &[(Image, Image)]) -> LinearFit {
        let xs: Vec<Image> = pairs.iter().map(|(x, _)| x.clone()).collect();
        let ys: Vec<Image> = pairs.iter().map(|(_, y)| y.clone()).collect();
        LinearFit {
            offset: Image::linear_fit_term(xs.clone(), ys.clone(), FitTerm::Offset),
            scale: Image::linear_fit_term(xs, ys, FitTerm::Scale),
        }
    }

    /// Predicted value for a given predictor image.
    pub fn predict(&self, x: &Image) -> Image {
        self.offset.add(self.scale.multiply(x))
    }
}
