//! Type-state markers for the builder pattern
//!
//! These types track which required fields have been set in the builder at
//! compile time, so a client without a URL or a pipeline cannot be built.

use std::marker::PhantomData;

/// Marker trait for URL state
pub trait UrlState {}

/// URL has not been set
pub struct NoUrl;
impl UrlState for NoUrl {}

/// URL has been set
pub struct HasUrl;
impl UrlState for HasUrl {}

/// Marker trait for pipeline (parser + handler) state
pub trait PipelineState {}

/// Pipeline has not been set
pub struct NoPipeline;
impl PipelineState for NoPipeline {}

/// Pipeline has been set
pub struct HasPipeline;
impl PipelineState for HasPipeline {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<U, P> {
    _url: PhantomData<U>,
    _pipeline: PhantomData<P>,
}

impl<U, P> TypeState<U, P> {
    pub(crate) fn new() -> Self {
        Self {
            _url: PhantomData,
            _pipeline: PhantomData,
        }
    }
}
