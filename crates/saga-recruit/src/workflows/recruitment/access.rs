use std::collections::BTreeSet;

use serde::Serialize;

use super::departments::{Department, UNIVERSAL_MEMBERSHIP};
use super::domain::{Applicant, Application};

/// Permission name that unlocks the decision-mail action.
pub const SEND_DECISION_PERMISSION: &str = "send_decision_email";

/// Identity facts about the acting operator, supplied by the caller on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessContext {
    pub departments: BTreeSet<Department>,
    pub universal: bool,
    pub superuser: bool,
    pub can_send_decision: bool,
}

impl AccessContext {
    /// Build a context from identity-provider group names. Unrecognized groups and groups
    /// outside [`Department::scoping`] are ignored.
    pub fn from_groups<'a, G, P>(groups: G, superuser: bool, permissions: P) -> Self
    where
        G: IntoIterator<Item = &'a str>,
        P: IntoIterator<Item = &'a str>,
    {
        let mut context = Self {
            superuser,
            ..Self::default()
        };

        for group in groups.into_iter().map(str::trim) {
            if group == UNIVERSAL_MEMBERSHIP {
                context.universal = true;
            } else if let Some(department) = Department::from_code(group)
                .filter(|department| Department::scoping().contains(department))
            {
                context.departments.insert(department);
            }
        }

        context.can_send_decision = superuser
            || permissions
                .into_iter()
                .any(|permission| permission.trim() == SEND_DECISION_PERMISSION);

        context
    }

    pub fn superuser() -> Self {
        Self {
            superuser: true,
            can_send_decision: true,
            ..Self::default()
        }
    }

    pub fn for_departments<I>(departments: I) -> Self
    where
        I: IntoIterator<Item = Department>,
    {
        Self {
            departments: departments.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_decision_capability(mut self) -> Self {
        self.can_send_decision = true;
        self
    }

    pub fn scope(&self) -> AccessScope {
        if self.superuser || self.universal {
            AccessScope::All
        } else if self.departments.is_empty() {
            AccessScope::Nothing
        } else {
            AccessScope::Departments(self.departments.clone())
        }
    }
}

/// Set of records an actor may see. Anything not explicitly granted is hidden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    All,
    Departments(BTreeSet<Department>),
    Nothing,
}

impl AccessScope {
    pub fn covers(&self, department: Department) -> bool {
        match self {
            AccessScope::All => true,
            AccessScope::Departments(departments) => departments.contains(&department),
            AccessScope::Nothing => false,
        }
    }

    /// Applicants are visible to the departments named as first or second choice.
    pub fn admits_applicant(&self, applicant: &Applicant) -> bool {
        match self {
            AccessScope::All => true,
            AccessScope::Nothing => false,
            AccessScope::Departments(_) => {
                self.covers(applicant.first_choice)
                    || applicant
                        .second_choice
                        .is_some_and(|department| self.covers(department))
            }
        }
    }

    pub fn admits_application(&self, application: &Application) -> bool {
        self.covers(application.handle_by)
    }

    pub fn filter_applicants<I>(&self, applicants: I) -> Vec<Applicant>
    where
        I: IntoIterator<Item = Applicant>,
    {
        applicants
            .into_iter()
            .filter(|applicant| self.admits_applicant(applicant))
            .collect()
    }

    pub fn filter_applications<I>(&self, applications: I) -> Vec<Application>
    where
        I: IntoIterator<Item = Application>,
    {
        applications
            .into_iter()
            .filter(|application| self.admits_application(application))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_map_to_departments_and_universal_flag() {
        let context = AccessContext::from_groups(["LAW", " IT", "volunteers"], false, []);
        assert_eq!(
            context.departments,
            BTreeSet::from([Department::Law, Department::It])
        );
        assert!(!context.universal);
        assert!(!context.can_send_decision);

        let universal = AccessContext::from_groups(["ALL"], false, [SEND_DECISION_PERMISSION]);
        assert!(universal.universal);
        assert!(universal.can_send_decision);
        assert_eq!(universal.scope(), AccessScope::All);
    }

    #[test]
    fn empty_membership_fails_closed() {
        let context = AccessContext::from_groups(["volunteers", "all"], false, []);
        assert_eq!(context.scope(), AccessScope::Nothing);
        assert!(!context.scope().covers(Department::Law));
    }

    #[test]
    fn presidium_group_alone_sees_nothing() {
        let context = AccessContext::from_groups(["PRE"], false, []);
        assert_eq!(context.scope(), AccessScope::Nothing);

        let mixed = AccessContext::from_groups(["PRE", "HR"], false, []);
        assert_eq!(mixed.departments, BTreeSet::from([Department::Hr]));
        assert!(!mixed.scope().covers(Department::Pre));
    }

    #[test]
    fn superuser_sees_everything_and_may_send_decisions() {
        let context = AccessContext::from_groups(std::iter::empty(), true, []);
        assert_eq!(context.scope(), AccessScope::All);
        assert!(context.can_send_decision);
    }
}
