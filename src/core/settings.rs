use std::sync::Arc;

use crate::core::neighbourhood::NeighbourhoodCondition;
use crate::core::time_series::TimeSeriesView;
use crate::error::{Result, RqaError};

/// One recurrence condition: a pair of series compared under a
/// neighbourhood condition.
#[derive(Debug, Clone)]
pub struct Component {
    x: Arc<TimeSeriesView>,
    y: Arc<TimeSeriesView>,
    neighbourhood: NeighbourhoodCondition,
}

impl Component {
    pub fn x(&self) -> &TimeSeriesView {
        &self.x
    }

    pub fn y(&self) -> &TimeSeriesView {
        &self.y
    }

    pub fn neighbourhood(&self) -> NeighbourhoodCondition {
        self.neighbourhood
    }

    pub fn embedding_dimension(&self) -> usize {
        self.x.embedding_dimension()
    }

    fn is_symmetric(&self) -> bool {
        Arc::ptr_eq(&self.x, &self.y) || self.x == self.y
    }
}

/// Immutable analysis settings shared by every tile of a run.
///
/// Columns of the recurrence matrix are the vectors of `x`, rows are the
/// vectors of `y`. Joint settings hold several components; a cell is
/// recurrent only when it is recurrent under every component, and the
/// matrix is cut to the shortest component.
#[derive(Debug, Clone)]
pub struct Settings {
    components: Vec<Component>,
    theiler_corrector: usize,
    symmetric: bool,
}

impl Settings {
    /// Analyse one series against itself.
    pub fn classic(
        series: TimeSeriesView,
        neighbourhood: NeighbourhoodCondition,
        theiler_corrector: usize,
    ) -> Result<Self> {
        let series = Arc::new(series);
        Self::from_shared(series.clone(), series, neighbourhood, theiler_corrector)
    }

    /// Analyse `x` (columns) against `y` (rows).
    ///
    /// The matrix is treated as symmetric when both series hold identical
    /// vectors.
    pub fn cross(
        x: TimeSeriesView,
        y: TimeSeriesView,
        neighbourhood: NeighbourhoodCondition,
        theiler_corrector: usize,
    ) -> Result<Self> {
        Self::from_shared(Arc::new(x), Arc::new(y), neighbourhood, theiler_corrector)
    }

    /// Joint analysis of two settings.
    ///
    /// The Theiler corrector of `first` applies to the joint matrix. The
    /// matrix is symmetric only when both inputs are.
    pub fn joint(first: Settings, second: Settings) -> Self {
        let symmetric = first.symmetric && second.symmetric;
        let mut components = first.components;
        components.extend(second.components);
        Self {
            components,
            theiler_corrector: first.theiler_corrector,
            symmetric,
        }
    }

    fn from_shared(
        x: Arc<TimeSeriesView>,
        y: Arc<TimeSeriesView>,
        neighbourhood: NeighbourhoodCondition,
        theiler_corrector: usize,
    ) -> Result<Self> {
        neighbourhood.validate()?;
        if x.embedding_dimension() != y.embedding_dimension() {
            return Err(RqaError::DimensionMismatch {
                expected: x.embedding_dimension(),
                actual: y.embedding_dimension(),
            });
        }
        let component = Component {
            x,
            y,
            neighbourhood,
        };
        let symmetric = component.is_symmetric();
        Ok(Self {
            components: vec![component],
            theiler_corrector,
            symmetric,
        })
    }

    /// Disable the symmetry optimisation; every tile of the full matrix is processed.
    pub fn without_symmetry(mut self) -> Self {
        self.symmetric = false;
        self
    }

    /// Every recurrence condition, the primary one first.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn is_joint(&self) -> bool {
        self.components.len() > 1
    }

    fn primary(&self) -> &Component {
        &self.components[0]
    }

    pub fn x(&self) -> &TimeSeriesView {
        self.primary().x()
    }

    pub fn y(&self) -> &TimeSeriesView {
        self.primary().y()
    }

    pub fn neighbourhood(&self) -> NeighbourhoodCondition {
        self.primary().neighbourhood()
    }

    pub fn theiler_corrector(&self) -> usize {
        self.theiler_corrector
    }

    pub fn is_matrix_symmetric(&self) -> bool {
        self.symmetric
    }

    pub fn embedding_dimension(&self) -> usize {
        self.primary().embedding_dimension()
    }

    /// Widest vector over all components, in elements.
    pub fn max_embedding_dimension(&self) -> usize {
        self.components
            .iter()
            .map(Component::embedding_dimension)
            .max()
            .unwrap_or(0)
    }

    /// Matrix width N.
    pub fn number_of_vectors_x(&self) -> usize {
        self.components
            .iter()
            .map(|c| c.x.number_of_vectors())
            .min()
            .unwrap_or(0)
    }

    /// Matrix height M.
    pub fn number_of_vectors_y(&self) -> usize {
        self.components
            .iter()
            .map(|c| c.y.number_of_vectors())
            .min()
            .unwrap_or(0)
    }
}
