//! Year-tagged image collections and their series reducers.

use super::image::{Image, SeriesReducer};

#[derive(Debug, Clone)]
pub struct AnnualImage {
    pub year: i32,
    pub image: Image,
}

/// An ordered collection of annual composites, the lazy analog of a
/// year-property image collection.
#[derive(Debug, Clone, Default)]
pub struct AnnualCollection {
    images: Vec<AnnualImage>,
}

impl AnnualCollection {
    pub fn new(mut images: Vec<AnnualImage>) -> AnnualCollection {
        images.sort_by_key(|img| img.year);
        AnnualCollection { images }
    }

    pub fn push(&mut self, year: i32, image: Image) {
        self.images.push(AnnualImage { year, image });
        self.images.sort_by_key(|img| img.year);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn years(&self) -> Vec<i32> {
        self.images.iter().map(|img| img.year).collect()
    }

    pub fn get(&self, year: i32) -> Option<&Image> {
        self.images
            .iter()
            .find(|img| img.year == year)
            .map(|img| &img.image)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnnualImage> {
        self.images.iter()
    }

    /// Keep the years in `start..=end`.
    pub fn filter_years(&self, start: i32, end: i32) -> AnnualCollection {
        AnnualCollection {
            images: self
                .images
                .iter()
                .filter(|img| img.year >= start && img.year <= end)
                .cloned()
                .collect(),
        }
    }

    /// Apply a per-year transformation, keeping the year tags.
    pub fn map(&self, f: impl Fn(i32, &Image) -> Image) -> AnnualCollection {
        AnnualCollection {
            images: self
                .images
                .iter()
                .map(|img| AnnualImage {
                    year: img.year,
                    image: f(img.year, &img.image),
                })
                .collect(),
        }
    }

    /// Pair up images of matching years, in year order.
    pub fn inner_join(&self, other: &AnnualCollection) -> Vec<(i32, Image, Image)> {
        self.images
            .iter()
            .filter_map(|img| {
                other
                    .get(img.year)
                    .map(|o| (img.year, img.image.clone(), o.clone()))
            })
            .collect()
    }

    fn reduce(&self, reducer: SeriesReducer) -> Image {
        let inputs = self.images.iter().map(|img| img.image.clone()).collect();
        Image::series_reduce(inputs, reducer)
    }

    /// Per-pixel mean over the valid years.
    pub fn mean(&self) -> Image {
        self.reduce(SeriesReducer::Mean)
    }

    /// Per-pixel population standard deviation over the valid years.
    pub fn std_dev(&self) -> Image {
        self.reduce(SeriesReducer::StdDev)
    }

    /// Per-pixel Kendall rank correlation against time, year-ordered.
    pub fn kendall_tau(&self) -> Image {
        self.reduce(SeriesReducer::KendallTau)
    }
}

impl FromIterator<(i32, Image)> for AnnualCollection {
    fn from_iter<T: IntoIterator<Item = (i32, Image)>>(iter: T) -> Self {
        AnnualCollection::new(
            iter.into_iter()
                .map(|(year, image)| AnnualImage { year, image })
                .collect(),
        )
    }
}
