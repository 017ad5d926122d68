//! # Sign profiles
//!
//! Everything which differs between the signs the rover can follow lives in a [`SignProfile`]:
//! gating thresholds for the continuity filter, the reference appearance, the control law
//! constants, the failure policy and the detector settings. Profiles are loaded from
//! `profiles.toml`, one `[profiles.<id>]` table per sign.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::path::PathBuf;

use comms_if::cmd::{CmdParseError, ProfileId};
use image::{Rgb, RgbImage};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::ctrl_law::{CtrlLawError, CtrlLawParams};
use util::params::{self, LoadError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Side length of the patch generated for a solid colour reference.
const SOLID_REFERENCE_SIZE_PX: u32 = 32;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Thresholds of the two stage continuity gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateParams {
    /// Maximum distance between a candidate's centroid and the track centre.
    ///
    /// Units: pixels
    pub max_distance_diff: f64,

    /// Maximum difference between a candidate's area and the track area.
    ///
    /// Units: pixels^2
    pub max_area_diff: f64,

    /// Lower (exclusive) bound of the accepted similarity score band.
    pub min_similarity: f64,

    /// Upper (exclusive) bound of the accepted similarity score band.
    pub max_similarity: f64,
}

/// What to do when the target is lost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailurePolicy {
    /// Number of consecutive failed cycles tolerated before the rover is halted.
    pub threshold: u32,

    /// Mark the track as invalid when halting, so that the next acquisition is a bootstrap.
    #[serde(default)]
    pub clear_track_on_backoff: bool,
}

/// Settings for the detector, interpreted by the detector implementation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectorParams {
    /// Nominal colour of the sign.
    pub colour_rgb: [u8; 3],

    /// Per channel tolerance around the nominal colour.
    pub colour_tol: u8,

    /// Minimum side length of a detection.
    ///
    /// Units: pixels
    pub min_size_px: u32,
}

/// The reference appearance of a sign.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceAppearance {
    pub image: RgbImage,
}

/// A complete sign profile.
#[derive(Debug, Clone)]
pub struct SignProfile {
    pub id: ProfileId,
    pub gate: GateParams,
    pub ctrl: CtrlLawParams,
    pub failure: FailurePolicy,
    pub detector: DetectorParams,
    pub reference: ReferenceAppearance,
}

/// The set of profiles available to the rover, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct ProfileTable {
    profiles: BTreeMap<ProfileId, SignProfile>,
}

/// Layout of a profile table in `profiles.toml`.
#[derive(Debug, Deserialize)]
struct ProfileTableFile {
    profiles: BTreeMap<String, ProfileEntry>,
}

#[derive(Debug, Deserialize)]
struct ProfileEntry {
    gate: GateParams,
    ctrl: CtrlLawParams,
    failure: FailurePolicy,
    detector: DetectorParams,
    reference: ReferenceSpec,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// How the reference appearance is given in the parameter file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ReferenceSpec {
    /// An image file, relative to the params directory.
    Image { path: PathBuf },

    /// A uniform patch of the given colour.
    Solid { rgb: [u8; 3] },
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Could not load the profile table: {0}")]
    LoadError(#[from] LoadError),

    #[error(transparent)]
    UnknownProfile(#[from] CmdParseError),

    #[error("The profile table contains no profiles")]
    NoProfiles,

    #[error("Invalid control law parameters for profile {0}: {1}")]
    InvalidCtrlLaw(ProfileId, CtrlLawError),

    #[error(
        "Invalid gate for profile {0}: the similarity band ({1}, {2}) is empty or a distance \
        limit is not positive"
    )]
    InvalidGate(ProfileId, f64, f64),

    #[error("Could not load the reference image {0:?}: {1}")]
    ReferenceImageError(PathBuf, image::ImageError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ReferenceAppearance {
    /// A reference consisting of a single uniform colour.
    pub fn solid(rgb: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(SOLID_REFERENCE_SIZE_PX, SOLID_REFERENCE_SIZE_PX, Rgb(rgb)),
        }
    }
}

impl SignProfile {
    /// Check the thresholds of the profile are consistent.
    pub fn check(&self) -> Result<(), ProfileError> {
        self.ctrl
            .check()
            .map_err(|e| ProfileError::InvalidCtrlLaw(self.id, e))?;

        let g = &self.gate;
        if !(g.min_similarity < g.max_similarity
            && g.max_distance_diff > 0.0
            && g.max_area_diff > 0.0)
        {
            return Err(ProfileError::InvalidGate(self.id, g.min_similarity, g.max_similarity));
        }

        Ok(())
    }
}

impl ProfileTable {
    /// Load the table from a file in the params directory.
    pub fn load(file_name: &str) -> Result<Self, ProfileError> {
        let file: ProfileTableFile = params::load(file_name)?;
        Self::from_file(file)
    }

    /// Parse the table from the contents of a profile file.
    ///
    /// Image references are resolved relative to the params directory.
    pub fn from_toml_str(s: &str) -> Result<Self, ProfileError> {
        Self::from_file(params::from_str(s)?)
    }

    /// Build a table from already constructed profiles, checking each of them.
    pub fn from_profiles<I>(profiles: I) -> Result<Self, ProfileError>
    where
        I: IntoIterator<Item = SignProfile>,
    {
        let mut table = Self::default();

        for p in profiles {
            p.check()?;
            table.profiles.insert(p.id, p);
        }

        if table.profiles.is_empty() {
            return Err(ProfileError::NoProfiles);
        }

        Ok(table)
    }

    /// Get a profile by identifier.
    pub fn get(&self, id: ProfileId) -> Option<&SignProfile> {
        self.profiles.get(&id)
    }

    /// Returns true if the table holds a profile for `id`.
    pub fn contains(&self, id: ProfileId) -> bool {
        self.profiles.contains_key(&id)
    }

    /// Identifiers of all profiles in the table, in order.
    pub fn ids(&self) -> Vec<ProfileId> {
        self.profiles.keys().copied().collect()
    }

    fn from_file(file: ProfileTableFile) -> Result<Self, ProfileError> {
        let mut profiles = Vec::with_capacity(file.profiles.len());

        for (name, entry) in file.profiles {
            let id: ProfileId = name.parse()?;

            let reference = match entry.reference {
                ReferenceSpec::Solid { rgb } => ReferenceAppearance::solid(rgb),
                ReferenceSpec::Image { path } => {
                    let path = if path.is_relative() {
                        params::params_path(&path)?
                    }
                    else {
                        path
                    };

                    let image = image::open(&path)
                        .map_err(|e| ProfileError::ReferenceImageError(path.clone(), e))?
                        .to_rgb8();

                    ReferenceAppearance { image }
                }
            };

            debug!("Loaded profile {}", id);

            profiles.push(SignProfile {
                id,
                gate: entry.gate,
                ctrl: entry.ctrl,
                failure: entry.failure,
                detector: entry.detector,
                reference,
            });
        }

        Self::from_profiles(profiles)
    }
}
