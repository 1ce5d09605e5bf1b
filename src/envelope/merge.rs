use std::sync::Arc;

use super::model::Envelope;
use super::registry::DatasetEntry;
use crate::error::{EnvelopeError, Result};

/// What an absorb did with the source's datasets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbsorbReport {
    /// Re-ingested datasets, in source order.
    pub ingested: Vec<String>,
    /// Datasets the source had already released. Only their names carry over.
    pub skipped: Vec<String>,
}

impl AbsorbReport {
    fn extend(&mut self, other: AbsorbReport) {
        self.ingested.extend(other.ingested);
        self.skipped.extend(other.skipped);
    }
}

/// Re-ingest every resident dataset of `source` into `target`, in the
/// source's insertion order, exactly as `add_dataset` would.
///
/// Datasets the source already released cannot be replayed. They fail the
/// call under `strict_absorb`; otherwise they are skipped and recorded in the
/// target as released placeholders.
///
/// Works on a staged copy of `target`: on error `target` is left as it was.
pub fn absorb(target: &mut Envelope, source: &Envelope) -> Result<AbsorbReport> {
    let mut staged = target.clone();
    let report = absorb_into(&mut staged, source)?;
    *target = staged;
    Ok(report)
}

/// Absorb several sources as one all-or-nothing step.
pub fn absorb_all<'a>(
    target: &mut Envelope,
    sources: impl IntoIterator<Item = &'a Envelope>,
) -> Result<AbsorbReport> {
    let mut staged = target.clone();
    let mut report = AbsorbReport::default();
    for source in sources {
        report.extend(absorb_into(&mut staged, source)?);
    }
    *target = staged;
    Ok(report)
}

/// Absorb without staging. On error `target` may hold part of `source`.
pub(super) fn absorb_into(target: &mut Envelope, source: &Envelope) -> Result<AbsorbReport> {
    let strict = target.options().strict_absorb;
    let mut report = AbsorbReport::default();

    for (_, entry) in source.registry().entries() {
        match entry {
            DatasetEntry::Resident(ds) => {
                target.add_dataset(Arc::clone(ds))?;
                report.ingested.push(ds.name().to_string());
            }
            DatasetEntry::Released(info) => {
                if strict {
                    return Err(EnvelopeError::DetachedDataset(info.name.clone()));
                }
                log::warn!(
                    "'{}': skipping released dataset '{}' from '{}'",
                    target.name(),
                    info.name,
                    source.name()
                );
                if target.registry().lookup(&info.name).is_none() {
                    target.registry_mut().store_released(info.clone())?;
                }
                report.skipped.push(info.name.clone());
            }
        }
    }

    log::info!(
        "'{}' absorbed '{}': {} dataset(s) ingested, {} skipped, {} vertices",
        target.name(),
        source.name(),
        report.ingested.len(),
        report.skipped.len(),
        target.engine().vertices().len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvelopeOptions;
    use crate::data::model::{Dataset, DatasetInfo};
    use crate::geometry::point::Point;

    fn dataset(name: &str, points: &[(f64, f64)]) -> Arc<Dataset> {
        Arc::new(
            Dataset::new(
                DatasetInfo::new(name),
                vec![
                    ("x".into(), points.iter().map(|p| p.0).collect()),
                    ("y".into(), points.iter().map(|p| p.1).collect()),
                ],
                None,
            )
            .unwrap(),
        )
    }

    fn envelope(datasets: Vec<Arc<Dataset>>, options: EnvelopeOptions) -> Envelope {
        Envelope::new("x", "y", datasets, options).unwrap()
    }

    #[test]
    fn absorb_unions_the_point_sets() {
        let mut a = envelope(
            vec![dataset("a", &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)])],
            EnvelopeOptions::default(),
        );
        let b = envelope(vec![dataset("b", &[(2.0, 2.0)])], EnvelopeOptions::default());

        let report = a.absorb(&b).unwrap();

        assert_eq!(report.ingested, vec!["b".to_string()]);
        assert_eq!(
            a.get_envelope_points(false),
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(2.0, 2.0),
                Point::new(0.0, 1.0),
            ]
        );
        assert_eq!(a.ledger().len(), a.len());
    }

    #[test]
    fn released_source_datasets_become_placeholders() {
        let source = envelope(
            vec![
                dataset("inside", &[(0.1, 0.1)]),
                dataset("outside", &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]),
            ],
            EnvelopeOptions::default(),
        );
        let mut target = envelope(vec![dataset("t", &[(5.0, 5.0)])], EnvelopeOptions::default());

        let report = target.absorb(&source).unwrap();

        assert_eq!(report.skipped, vec!["inside".to_string()]);
        let id = target.registry().lookup("inside").unwrap();
        assert!(!target.registry().is_resident(id));
        assert_eq!(target.len(), 4);
    }

    #[test]
    fn strict_absorb_fails_and_leaves_target_unchanged() {
        let source = envelope(
            vec![
                dataset("outside", &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]),
                dataset("inside", &[(0.1, 0.1)]),
            ],
            EnvelopeOptions::default(),
        );
        let mut target = envelope(
            vec![dataset("t", &[(5.0, 5.0)])],
            EnvelopeOptions::default().strict_absorb(true),
        );

        let err = target.absorb(&source).unwrap_err();

        assert!(matches!(err, EnvelopeError::DetachedDataset(name) if name == "inside"));
        assert_eq!(target.len(), 1);
        assert_eq!(target.registry().len(), 1);
        assert!(target.registry().lookup("outside").is_none());
    }

    #[test]
    fn name_collision_rolls_back_every_source() {
        let mut target = envelope(vec![dataset("a", &[(0.0, 0.0)])], EnvelopeOptions::default());
        let fine = envelope(vec![dataset("b", &[(1.0, 1.0)])], EnvelopeOptions::default());
        let clash = envelope(vec![dataset("a", &[(2.0, 0.0)])], EnvelopeOptions::default());

        assert!(matches!(
            absorb_all(&mut target, [&fine, &clash]),
            Err(EnvelopeError::DuplicateName(_))
        ));
        assert_eq!(target.len(), 1);
        assert!(target.registry().lookup("b").is_none());
    }
}
