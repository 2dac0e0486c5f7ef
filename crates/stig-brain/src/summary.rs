/// Summary statistics of a block of network parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSummary {
    pub count: usize,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub std_dev: f32,
}

impl WeightSummary {
    /// Summarizes `values`, or returns `None` if there are none.
    ///
    /// ```
    /// # use stig_brain::summary::WeightSummary;
    /// let summary = WeightSummary::new([1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(summary.count, 3);
    /// assert_eq!(summary.mean, 2.0);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f32>,
    {
        let values = values.into_iter().collect::<Vec<_>>();
        let min = values.iter().copied().reduce(f32::min)?;
        let max = values.iter().copied().reduce(f32::max)?;
        let n = values.len() as f32;
        let mean = values.iter().sum::<f32>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        Some(Self {
            count: values.len(),
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
        })
    }
}
