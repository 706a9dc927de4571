use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The role labels offered during registration, grouped by category.
const DEFAULT_ROLES: &[(&str, &str)] = &[
    ("Church & Ministry", "Senior Pastor"),
    ("Church & Ministry", "Pastor"),
    ("Church & Ministry", "Elder"),
    ("Church & Ministry", "Worship Leader"),
    ("Church & Ministry", "Youth Leader"),
    ("Church & Ministry", "Church Planter"),
    ("Mission & Evangelism", "Evangelist"),
    ("Mission & Evangelism", "Missionary"),
    ("Mission & Evangelism", "Mission Director"),
    ("Mission & Evangelism", "Prayer Coordinator"),
    ("Mission & Evangelism", "Outreach Leader"),
    ("Marketplace & Society", "Founder"),
    ("Marketplace & Society", "CEO"),
    ("Marketplace & Society", "Entrepreneur"),
    ("Marketplace & Society", "Politician"),
    ("Marketplace & Society", "Educator"),
    ("Marketplace & Society", "Non-Profit Leader"),
    ("Creative & Media", "Author"),
    ("Creative & Media", "Musician"),
    ("Creative & Media", "Content Creator"),
    ("Creative & Media", "Filmmaker"),
    ("Creative & Media", "Speaker"),
];

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct RoleOption {
    pub category: String,
    pub label: String,
}

/// Selection limits for roles.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
pub struct RoleCaps {
    pub max_per_category: usize,

    /// Limit across all categories, unlimited if None
    #[serde(default)]
    pub max_total: Option<usize>,
}

impl Default for RoleCaps {
    fn default() -> Self {
        RoleCaps {
            max_per_category: 4,
            max_total: None,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(transparent)]
pub struct RoleCatalog {
    roles: Vec<RoleOption>,
}

impl Default for RoleCatalog {
    fn default() -> Self {
        RoleCatalog::new(
            DEFAULT_ROLES
                .iter()
                .map(|(category, label)| RoleOption {
                    category: category.to_string(),
                    label: label.to_string(),
                })
                .collect(),
        )
    }
}

impl RoleCatalog {
    pub fn new(roles: Vec<RoleOption>) -> Self {
        RoleCatalog { roles }
    }

    pub fn roles(&self) -> &[RoleOption] {
        &self.roles
    }

    /// Category names in catalog order
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = vec![];
        for role in &self.roles {
            if !categories.contains(&role.category.as_str()) {
                categories.push(&role.category);
            }
        }
        categories
    }

    pub fn category_of(&self, label: &str) -> Option<&str> {
        self.roles
            .iter()
            .find(|r| r.label == label)
            .map(|r| r.category.as_str())
    }
}

/// Selected/maximum count for one category
#[derive(Serialize, PartialEq, Eq, Debug, Clone)]
pub struct CategoryCount {
    pub category: String,
    pub selected: usize,
    pub max: usize,
}

/// An ordered set of selected role labels.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
#[serde(transparent)]
pub struct RoleSelection {
    selected: Vec<String>,
}

impl RoleSelection {
    pub fn is_selected(&self, label: &str) -> bool {
        self.selected.iter().any(|l| l == label)
    }

    pub fn count_in(&self, catalog: &RoleCatalog, category: &str) -> usize {
        self.selected
            .iter()
            .filter(|l| catalog.category_of(l) == Some(category))
            .count()
    }

    pub fn counts(&self, catalog: &RoleCatalog, caps: &RoleCaps) -> Vec<CategoryCount> {
        catalog
            .categories()
            .into_iter()
            .map(|category| CategoryCount {
                category: category.to_string(),
                selected: self.count_in(catalog, category),
                max: caps.max_per_category,
            })
            .collect()
    }

    /// Whether the role can be toggled. Selected roles can always be removed.
    pub fn is_selectable(&self, catalog: &RoleCatalog, caps: &RoleCaps, label: &str) -> bool {
        if self.is_selected(label) {
            return true;
        }
        self.check_add(catalog, caps, label).is_ok()
    }

    fn check_add(&self, catalog: &RoleCatalog, caps: &RoleCaps, label: &str) -> Result<(), Error> {
        let category = catalog
            .category_of(label)
            .ok_or_else(|| Error::UnknownRole(label.to_string()))?;

        if self.count_in(catalog, category) >= caps.max_per_category {
            return Err(Error::CategoryFull(
                category.to_string(),
                caps.max_per_category,
            ));
        }

        match caps.max_total {
            Some(max) if self.selected.len() >= max => Err(Error::TooManyRoles(max)),
            _ => Ok(()),
        }
    }

    /// Selects or deselects a role, returning the new selection.
    pub fn toggle(
        &self,
        catalog: &RoleCatalog,
        caps: &RoleCaps,
        label: &str,
    ) -> Result<RoleSelection, Error> {
        let mut new_selection = self.clone();
        if self.is_selected(label) {
            new_selection.selected.retain(|l| l != label);
        } else {
            self.check_add(catalog, caps, label)?;
            new_selection.selected.push(label.to_string());
        }
        Ok(new_selection)
    }

    /// Title string stored on the participant
    pub fn title(&self) -> String {
        self.selected.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;

    use super::{RoleCaps, RoleCatalog, RoleSelection};

    fn select_all(labels: &[&str], caps: &RoleCaps) -> RoleSelection {
        let catalog = RoleCatalog::default();
        labels.iter().fold(RoleSelection::default(), |sel, label| {
            sel.toggle(&catalog, caps, label).unwrap()
        })
    }

    #[test]
    fn test_catalog() {
        let catalog = RoleCatalog::default();
        assert_eq!(
            catalog.categories(),
            vec!["Church & Ministry", "Mission & Evangelism", "Marketplace & Society", "Creative & Media"]
        );
        assert_eq!(catalog.category_of("Evangelist"), Some("Mission & Evangelism"));
        let media = catalog
            .roles()
            .iter()
            .filter(|r| r.category == "Creative & Media")
            .count();
        assert_eq!(media, 5);
    }

    #[test]
    fn test_category_cap() {
        let catalog = RoleCatalog::default();
        let caps = RoleCaps::default();
        let sel = select_all(&["Senior Pastor", "Pastor", "Elder", "Worship Leader"], &caps);

        assert_eq!(sel.count_in(&catalog, "Church & Ministry"), 4);
        assert!(!sel.is_selectable(&catalog, &caps, "Youth Leader"));
        assert_eq!(
            sel.toggle(&catalog, &caps, "Youth Leader"),
            Err(Error::CategoryFull("Church & Ministry".to_string(), 4))
        );

        // other categories are unaffected
        assert!(sel.is_selectable(&catalog, &caps, "Author"));

        let sel = sel.toggle(&catalog, &caps, "Elder").unwrap();
        assert!(sel.is_selectable(&catalog, &caps, "Youth Leader"));
        let sel = sel.toggle(&catalog, &caps, "Youth Leader").unwrap();
        assert_eq!(sel.title(), "Senior Pastor, Pastor, Worship Leader, Youth Leader");
    }

    #[test]
    fn test_total_cap() {
        let catalog = RoleCatalog::default();
        let caps = RoleCaps {
            max_per_category: 4,
            max_total: Some(5),
        };
        let sel = select_all(&["Pastor", "Elder", "Evangelist", "Missionary", "Author"], &caps);

        assert!(!sel.is_selectable(&catalog, &caps, "CEO"));
        assert_eq!(sel.toggle(&catalog, &caps, "CEO"), Err(Error::TooManyRoles(5)));
        assert!(sel.is_selectable(&catalog, &caps, "Author"));
    }

    #[test]
    fn test_unknown_role() {
        let catalog = RoleCatalog::default();
        let caps = RoleCaps::default();

        assert!(!RoleSelection::default().is_selectable(&catalog, &caps, "Astronaut"));
        assert_eq!(
            RoleSelection::default().toggle(&catalog, &caps, "Astronaut"),
            Err(Error::UnknownRole("Astronaut".to_string()))
        );
    }

    #[test]
    fn test_counts() {
        let catalog = RoleCatalog::default();
        let caps = RoleCaps::default();
        let sel = select_all(&["Pastor", "Author", "Speaker"], &caps);

        let counts = sel.counts(&catalog, &caps);
        assert_eq!(counts[0].selected, 1);
        assert_eq!(counts[3].selected, 2);
        assert!(counts.iter().all(|c| c.max == 4));
    }
}
