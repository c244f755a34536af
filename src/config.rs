//! YAML chore configuration (`chores.yaml`): one mapping `name -> {chore:
//! <type>, ...type-specific keys}`, mirroring the `ProbeDescriptor` variants.
//!
//! Grounded on `piss.py`'s `yaml.dump_all`/`yaml.safe_load_all` usage and
//! `generate_chore_config` in `piss/chores.py`.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::classifier::{BitbucketKind, ProbeDescriptor};

/// A named, configured chore: what the YAML file actually stores.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoreDefinition {
    pub name: String,
    pub descriptor: ProbeDescriptor,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "chore", rename_all = "lowercase")]
enum ChoreYaml {
    Github {
        repo: String,
    },
    Gitlab {
        repo: String,
    },
    Bitbucket {
        repo: String,
        kind: BitbucketKindYaml,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        prefix: Option<String>,
    },
    Pypi {
        name: String,
    },
    Rubygems {
        gem: String,
    },
    Npm {
        package: String,
    },
    Launchpad {
        project: String,
    },
    Sourceforge {
        project: String,
        path: String,
    },
    Cgit {
        url: String,
        project: String,
    },
    Dirlist {
        url: String,
        prefix: String,
    },
    Ftp {
        url: String,
        prefix: String,
    },
    Html {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        selector: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        regex: Option<String>,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum BitbucketKindYaml {
    Downloads,
    Tag,
}

impl From<BitbucketKind> for BitbucketKindYaml {
    fn from(k: BitbucketKind) -> Self {
        match k {
            BitbucketKind::Downloads => BitbucketKindYaml::Downloads,
            BitbucketKind::Tag => BitbucketKindYaml::Tag,
        }
    }
}

impl From<BitbucketKindYaml> for BitbucketKind {
    fn from(k: BitbucketKindYaml) -> Self {
        match k {
            BitbucketKindYaml::Downloads => BitbucketKind::Downloads,
            BitbucketKindYaml::Tag => BitbucketKind::Tag,
        }
    }
}

impl From<ProbeDescriptor> for ChoreYaml {
    fn from(d: ProbeDescriptor) -> Self {
        match d {
            ProbeDescriptor::GitHub { repo } => ChoreYaml::Github { repo },
            ProbeDescriptor::GitLab { repo } => ChoreYaml::Gitlab { repo },
            ProbeDescriptor::Bitbucket { repo, kind, prefix } => ChoreYaml::Bitbucket { repo, kind: kind.into(), prefix },
            ProbeDescriptor::PyPi { name } => ChoreYaml::Pypi { name },
            ProbeDescriptor::RubyGems { gem } => ChoreYaml::Rubygems { gem },
            ProbeDescriptor::Npm { package } => ChoreYaml::Npm { package },
            ProbeDescriptor::Launchpad { project } => ChoreYaml::Launchpad { project },
            ProbeDescriptor::SourceForge { project, path } => ChoreYaml::Sourceforge { project, path },
            ProbeDescriptor::Cgit { url, project } => ChoreYaml::Cgit { url, project },
            ProbeDescriptor::DirListing { url, prefix } => ChoreYaml::Dirlist { url, prefix },
            ProbeDescriptor::Ftp { url, prefix } => ChoreYaml::Ftp { url, prefix },
            ProbeDescriptor::Html { url, selector, regex } => ChoreYaml::Html { url, selector, regex },
        }
    }
}

impl From<ChoreYaml> for ProbeDescriptor {
    fn from(c: ChoreYaml) -> Self {
        match c {
            ChoreYaml::Github { repo } => ProbeDescriptor::GitHub { repo },
            ChoreYaml::Gitlab { repo } => ProbeDescriptor::GitLab { repo },
            ChoreYaml::Bitbucket { repo, kind, prefix } => ProbeDescriptor::Bitbucket { repo, kind: kind.into(), prefix },
            ChoreYaml::Pypi { name } => ProbeDescriptor::PyPi { name },
            ChoreYaml::Rubygems { gem } => ProbeDescriptor::RubyGems { gem },
            ChoreYaml::Npm { package } => ProbeDescriptor::Npm { package },
            ChoreYaml::Launchpad { project } => ProbeDescriptor::Launchpad { project },
            ChoreYaml::Sourceforge { project, path } => ProbeDescriptor::SourceForge { project, path },
            ChoreYaml::Cgit { url, project } => ProbeDescriptor::Cgit { url, project },
            ChoreYaml::Dirlist { url, prefix } => ProbeDescriptor::DirListing { url, prefix },
            ChoreYaml::Ftp { url, prefix } => ProbeDescriptor::Ftp { url, prefix },
            ChoreYaml::Html { url, selector, regex } => ProbeDescriptor::Html { url, selector, regex },
        }
    }
}

/// Parse a `chores.yaml` document into a list of chore definitions.
pub fn parse_chores(yaml: &str) -> Result<Vec<ChoreDefinition>> {
    let map: BTreeMap<String, ChoreYaml> = serde_yaml::from_str(yaml).context("parsing chores.yaml")?;
    Ok(map
        .into_iter()
        .map(|(name, chore)| ChoreDefinition {
            name,
            descriptor: chore.into(),
        })
        .collect())
}

/// Serialize chore definitions back to YAML, dropping null fields (spec §6).
pub fn render_chores(chores: &[ChoreDefinition]) -> Result<String> {
    let map: BTreeMap<String, ChoreYaml> = chores
        .iter()
        .map(|c| (c.name.clone(), ChoreYaml::from(c.descriptor.clone())))
        .collect();
    serde_yaml::to_string(&map).context("serializing chores.yaml")
}

/// Merge freshly generated chores with an existing config, preserving
/// hand-edited entries by name (spec.md §B.1 / `generate_chore_config`).
pub fn merge_chores(generated: Vec<ChoreDefinition>, existing: Vec<ChoreDefinition>) -> Vec<ChoreDefinition> {
    let mut by_name: BTreeMap<String, ChoreDefinition> =
        generated.into_iter().map(|c| (c.name.clone(), c)).collect();
    for chore in existing {
        by_name.insert(chore.name.clone(), chore);
    }
    by_name.into_values().collect()
}

/// Heuristic package-name guesser from a bookmarked URL and page title, used
/// only by the `generate` bootstrapper when no abbs name is available.
/// Not wired into [`crate::classifier::detect_upstream`] (§B.2).
pub fn guess_name(url: &str, title: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some(segments) = parsed.path_segments() {
            if let Some(last) = segments.filter(|s| !s.is_empty()).last() {
                let stripped = last.split('.').next().unwrap_or(last);
                if !stripped.is_empty() {
                    return stripped.to_ascii_lowercase();
                }
            }
        }
    }
    title
        .split_whitespace()
        .next()
        .unwrap_or("unknown")
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_yaml() {
        let chores = vec![ChoreDefinition {
            name: "foo".into(),
            descriptor: ProbeDescriptor::GitHub { repo: "org/foo".into() },
        }];
        let yaml = render_chores(&chores).unwrap();
        let parsed = parse_chores(&yaml).unwrap();
        assert_eq!(parsed, chores);
    }

    #[test]
    fn merge_prefers_existing_entries() {
        let generated = vec![ChoreDefinition {
            name: "foo".into(),
            descriptor: ProbeDescriptor::DirListing { url: "https://a/".into(), prefix: "foo".into() },
        }];
        let existing = vec![ChoreDefinition {
            name: "foo".into(),
            descriptor: ProbeDescriptor::GitHub { repo: "org/foo".into() },
        }];
        let merged = merge_chores(generated, existing);
        assert_eq!(merged[0].descriptor, ProbeDescriptor::GitHub { repo: "org/foo".into() });
    }

    #[test]
    fn guess_name_takes_last_path_segment() {
        assert_eq!(guess_name("https://example.com/downloads/foobar.tar.gz", ""), "foobar");
    }

    #[test]
    fn guess_name_falls_back_to_title() {
        assert_eq!(guess_name("not a url", "Foobar Project Homepage"), "foobar");
    }
}
