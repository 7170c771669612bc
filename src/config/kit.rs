// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! The drum kit that is always loaded alongside the archival set.

use serde::{Deserialize, Serialize};

use crate::catalog::{SampleDescriptor, SampleKind};

/// A YAML representation of a kit sample.
#[derive(Deserialize, Clone, Serialize, Debug, PartialEq, Eq)]
pub struct KitSample {
    /// The full sample name.
    title: String,
    /// The short name shown on the pad.
    label: String,
    /// Location of the audio relative to the samples root.
    url: String,
}

impl KitSample {
    pub fn new(title: &str, label: &str, url: &str) -> KitSample {
        KitSample {
            title: title.to_string(),
            label: label.to_string(),
            url: url.to_string(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Describes the sample at the given position in the kit.
    pub fn descriptor(&self, index: usize) -> SampleDescriptor {
        SampleDescriptor {
            id: format!("kit/{}-{}", index + 1, self.label),
            kind: SampleKind::Kit,
            title: self.title.clone(),
            label: self.label.clone(),
            source_url: self.url.clone(),
            attribution: None,
        }
    }
}

/// The default four-piece kit.
pub fn default_kit() -> Vec<KitSample> {
    vec![
        KitSample::new("Kick_Bulldog_2", "Kick", "kits/kicks/Kick_Bulldog_2.wav"),
        KitSample::new("Snare_Astral_1", "Snare", "kits/snares/Snare_Astral_1.wav"),
        KitSample::new(
            "ClosedHH_Alessya_DS",
            "HiHat",
            "kits/hats/ClosedHH_Alessya_DS.wav",
        ),
        KitSample::new("Clap_Graphite", "Clap", "kits/claps/Clap_Graphite.wav"),
    ]
}

/// Describes every sample of a kit, in order.
pub fn descriptors(kit: &[KitSample]) -> Vec<SampleDescriptor> {
    kit.iter()
        .enumerate()
        .map(|(index, sample)| sample.descriptor(index))
        .collect()
}

#[cfg(test)]
mod test {
    use crate::catalog::SampleKind;

    use super::{default_kit, descriptors};

    #[test]
    fn test_default_kit_descriptors() {
        let kit = descriptors(&default_kit());
        assert_eq!(4, kit.len());
        assert_eq!("kit/1-Kick", kit[0].id);
        assert_eq!("kit/4-Clap", kit[3].id);
        assert_eq!("kits/hats/ClosedHH_Alessya_DS.wav", kit[2].source_url);
        assert!(kit.iter().all(|d| d.kind == SampleKind::Kit));
    }
}
