//! The `ExposureRegistry` trait — read-only access to an external
//! exposure registry.
//!
//! Registries are external collaborators: this service never creates or
//! mutates exposures, it only queries them. A deployment configures one
//! or more registries, searched in order.

use std::future::Future;

use crate::{exposure::Exposure, query::ExposureQuery};

pub trait ExposureRegistry: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Look up the single exposure with this instrument and obs_id.
  ///
  /// Returns `None` when no exposure matches (including when the
  /// instrument is unknown to the registry). More than one match means
  /// the registry is corrupt and is an error.
  fn find_exposure<'a>(
    &'a self,
    instrument: &'a str,
    obs_id: &'a str,
  ) -> impl Future<Output = Result<Option<Exposure>, Self::Error>> + Send + 'a;

  /// Search one instrument's exposures. An unknown instrument yields an
  /// empty result, not an error.
  fn find_exposures<'a>(
    &'a self,
    instrument: &'a str,
    query: &'a ExposureQuery,
  ) -> impl Future<Output = Result<Vec<Exposure>, Self::Error>> + Send + 'a;

  /// The instruments this registry has exposures for.
  fn instruments(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;
}
