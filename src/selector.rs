//! Way selection: which OSM ways belong in the routable network.

use std::str::FromStr;

use fnv::{FnvHashMap, FnvHashSet};

use crate::error::FloodError;

/// Decides, tag by tag, whether a way is routable and whether it is one-way.
pub trait WaySelector {
    fn includes(&self, key: &str, value: &str) -> bool;

    fn is_one_way(&self, key: &str, value: &str) -> bool {
        match key {
            "oneway" => matches!(value, "yes" | "true" | "1" | "-1"),
            "junction" => value == "roundabout",
            _ => false,
        }
    }
}

impl<S: WaySelector + ?Sized> WaySelector for &S {
    fn includes(&self, key: &str, value: &str) -> bool {
        (**self).includes(key, value)
    }

    fn is_one_way(&self, key: &str, value: &str) -> bool {
        (**self).is_one_way(key, value)
    }
}

const CAR_HIGHWAYS: &[&str] = &[
    "motorway",
    "trunk",
    "primary",
    "secondary",
    "tertiary",
    "unclassified",
    "residential",
    "service",
    "motorway_link",
    "trunk_link",
    "primary_link",
    "secondary_link",
    "tertiary_link",
    "road",
];

const PEDESTRIAN_HIGHWAYS: &[&str] = &["pedestrian", "living_street", "footway", "steps", "path"];

const SIDEWALKS: &[&str] = &["left", "right", "both"];

const CYCLEWAYS: &[&str] = &[
    "lane",
    "opposite",
    "opposite_lane",
    "track",
    "opposite_track",
    "share_busway",
    "shared_lane",
];

/// Named road-class profiles with fixed tag tables.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Profile {
    Car,
    Pedestrian,
    Bicycle,
}

impl Profile {
    /// The (key, value) pairs accepted by this profile.
    pub fn pairs(self) -> Vec<(&'static str, &'static str)> {
        let tagged = |key: &'static str, values: &'static [&'static str]| {
            values.iter().map(move |v| (key, *v))
        };
        match self {
            Profile::Car => tagged("highway", CAR_HIGHWAYS).collect(),
            Profile::Pedestrian => tagged("highway", PEDESTRIAN_HIGHWAYS)
                .chain(tagged("sidewalk", SIDEWALKS))
                .collect(),
            Profile::Bicycle => std::iter::once(("highway", "cycleway"))
                .chain(tagged("cycleway", CYCLEWAYS))
                .collect(),
        }
    }
}

impl WaySelector for Profile {
    fn includes(&self, key: &str, value: &str) -> bool {
        match (self, key) {
            (Profile::Car, "highway") => CAR_HIGHWAYS.contains(&value),
            (Profile::Pedestrian, "highway") => PEDESTRIAN_HIGHWAYS.contains(&value),
            (Profile::Pedestrian, "sidewalk") => SIDEWALKS.contains(&value),
            (Profile::Bicycle, "highway") => value == "cycleway",
            (Profile::Bicycle, "cycleway") => CYCLEWAYS.contains(&value),
            _ => false,
        }
    }
}

#[derive(Clone, Debug)]
enum Accept {
    Any,
    Values(FnvHashSet<String>),
}

/// User-configurable selector: explicit (key, value) pairs, key wildcards and
/// whole profiles can be combined.
#[derive(Clone, Debug, Default)]
pub struct TagSelector {
    accepted: FnvHashMap<String, Accept>,
}

impl TagSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    pub fn add(&mut self, key: &str, value: &str) -> &mut Self {
        match self
            .accepted
            .entry(key.to_string())
            .or_insert_with(|| Accept::Values(FnvHashSet::default()))
        {
            Accept::Any => {}
            Accept::Values(values) => {
                values.insert(value.to_string());
            }
        }
        self
    }

    /// Accept every value of `key`.
    pub fn add_key(&mut self, key: &str) -> &mut Self {
        self.accepted.insert(key.to_string(), Accept::Any);
        self
    }

    pub fn add_profile(&mut self, profile: Profile) -> &mut Self {
        for (key, value) in profile.pairs() {
            self.add(key, value);
        }
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.add_profile(profile);
        self
    }

    /// Adds a `key=value` or bare `key` rule.
    pub fn add_rule(&mut self, rule: &str) -> Result<&mut Self, FloodError> {
        let rule: SelectorRule = rule.parse()?;
        Ok(match rule.value {
            Some(value) => self.add(&rule.key, &value),
            None => self.add_key(&rule.key),
        })
    }
}

impl WaySelector for TagSelector {
    fn includes(&self, key: &str, value: &str) -> bool {
        match self.accepted.get(key) {
            Some(Accept::Any) => true,
            Some(Accept::Values(values)) => values.contains(value),
            None => false,
        }
    }
}

/// A parsed `key=value` / `key` selector argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectorRule {
    pub key: String,
    pub value: Option<String>,
}

impl FromStr for SelectorRule {
    type Err = FloodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FloodError::InvalidSelector(s.to_string());
        let (key, value) = match s.split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (s.trim(), None),
        };
        if key.is_empty() || value.is_some_and(str::is_empty) {
            return Err(invalid());
        }
        Ok(Self {
            key: key.to_string(),
            value: value.map(str::to_string),
        })
    }
}
