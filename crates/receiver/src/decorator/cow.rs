use std::sync::Arc;

pub(crate) struct CowMessage<T: Clone> {
    origin: Arc<T>,
    shadow: Option<T>,
}

impl<T: Clone> CowMessage<T> {
    pub fn new(origin: Arc<T>) -> Self {
        Self {
            origin,
            shadow: None,
        }
    }

    #[inline]
    pub fn get(&self) -> &T {
        self.shadow.as_ref().unwrap_or(&self.origin)
    }

    /// Clones the origin on first call only
    #[inline]
    pub fn make_mut(&mut self) -> &mut T {
        let origin = &self.origin;
        self.shadow.get_or_insert_with(|| T::clone(origin))
    }

    #[inline]
    pub fn is_materialized(&self) -> bool {
        self.shadow.is_some()
    }

    pub fn build(self) -> Arc<T> {
        match self.shadow {
            Some(shadow) => Arc::new(shadow),
            None => self.origin,
        }
    }
}
