use super::merge;
use super::model::Envelope;
use crate::error::{EnvelopeError, Result};

/// A named group of envelopes plus the envelope of all of them.
///
/// The full envelope starts as a copy of the first member, renamed after the
/// set, and absorbs every other member.
#[derive(Debug, Clone)]
pub struct EnvelopeSet {
    name: String,
    description: String,
    envelopes: Vec<Envelope>,
    full: Envelope,
}

impl EnvelopeSet {
    pub fn new(
        envelopes: Vec<Envelope>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let description = description.into();

        let (first, rest) = envelopes
            .split_first()
            .ok_or_else(|| EnvelopeError::EmptyInput("an envelope set needs members".into()))?;
        let mut full = first.clone();
        full.set_name(name.clone());
        full.set_description(description.clone());
        merge::absorb_all(&mut full, rest)?;

        log::info!(
            "envelope set '{name}': {} member(s), {} vertices",
            envelopes.len(),
            full.engine().vertices().len()
        );
        Ok(Self {
            name,
            description,
            envelopes,
            full,
        })
    }

    /// Fold more members into the full envelope. On error neither the
    /// members nor the full envelope change.
    pub fn add_envelopes(&mut self, envelopes: Vec<Envelope>) -> Result<()> {
        merge::absorb_all(&mut self.full, &envelopes)?;
        self.envelopes.extend(envelopes);
        Ok(())
    }

    pub fn full_envelope(&self) -> &Envelope {
        &self.full
    }

    pub fn envelopes(&self) -> &[Envelope] {
        &self.envelopes
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }
}
