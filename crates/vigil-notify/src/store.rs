//! In-memory notification store.
//!
//! [`NotificationStore`] holds users, filters, recurrence groups, profiles
//! and destinations, and the join sets linking profiles to filters and
//! destinations. It enforces the invariants a persistent backend would:
//!
//! - Names of filters, groups and profiles are unique per user
//! - Destination settings pass their medium's validation before storage
//! - A recurrence group belongs to at most one profile, of the same user
//! - Deleting a profile deletes its group; filters and destinations survive
//! - Destinations in use, or synced from an account, are not deleted

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};
use vigil_filter::{Filter, FilterId, FilterSpecification};
use vigil_incident::UserId;
use vigil_schedule::{GroupId, TimeRecurrence, TimeRecurrenceGroup};

use crate::destination::{Destination, DestinationId, User};
use crate::error::{NotifyError, Result};
use crate::media::email::{EmailMedium, EMAIL_SLUG};
use crate::media::{Medium, MediumRegistry};
use crate::profile::{NewProfile, NotificationProfile, ProfileId};

/// Entities with an owner and a per-owner unique name.
trait Named {
    fn owner(&self) -> UserId;
    fn label(&self) -> &str;
}

impl Named for Filter {
    fn owner(&self) -> UserId {
        self.user
    }
    fn label(&self) -> &str {
        &self.name
    }
}

impl Named for TimeRecurrenceGroup {
    fn owner(&self) -> UserId {
        self.user
    }
    fn label(&self) -> &str {
        &self.name
    }
}

impl Named for NotificationProfile {
    fn owner(&self) -> UserId {
        self.user
    }
    fn label(&self) -> &str {
        &self.name
    }
}

fn ensure_name_free<T: Named>(
    entries: &BTreeMap<u64, T>,
    kind: &'static str,
    user: UserId,
    name: &str,
    except: u64,
) -> Result<()> {
    let taken = entries
        .iter()
        .any(|(id, e)| *id != except && e.owner() == user && e.label() == name);
    if taken {
        return Err(NotifyError::NameTaken {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

fn same_medium(
    destinations: &BTreeMap<DestinationId, Destination>,
    user: UserId,
    media: &str,
    except: DestinationId,
) -> Vec<Destination> {
    destinations
        .values()
        .filter(|d| d.user == user && d.media == media && d.id != except)
        .cloned()
        .collect()
}

/// In-memory store of notification settings.
#[derive(Debug)]
pub struct NotificationStore {
    registry: Arc<MediumRegistry>,
    users: RwLock<BTreeMap<UserId, User>>,
    filters: RwLock<BTreeMap<FilterId, Filter>>,
    groups: RwLock<BTreeMap<GroupId, TimeRecurrenceGroup>>,
    profiles: RwLock<BTreeMap<ProfileId, NotificationProfile>>,
    destinations: RwLock<BTreeMap<DestinationId, Destination>>,
    profile_filters: RwLock<BTreeSet<(ProfileId, FilterId)>>,
    profile_destinations: RwLock<BTreeSet<(ProfileId, DestinationId)>>,
    next_id: AtomicU64,
}

impl NotificationStore {
    /// Creates an empty store validating destinations with `registry`.
    #[must_use]
    pub fn new(registry: Arc<MediumRegistry>) -> Self {
        Self {
            registry,
            users: RwLock::new(BTreeMap::new()),
            filters: RwLock::new(BTreeMap::new()),
            groups: RwLock::new(BTreeMap::new()),
            profiles: RwLock::new(BTreeMap::new()),
            destinations: RwLock::new(BTreeMap::new()),
            profile_filters: RwLock::new(BTreeSet::new()),
            profile_destinations: RwLock::new(BTreeSet::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the medium registry.
    #[must_use]
    pub fn registry(&self) -> &MediumRegistry {
        &self.registry
    }

    fn allocate_id(&self) -> Result<u64> {
        self.next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .map_err(|_| NotifyError::validation("identifier space exhausted"))
    }

    fn reserve_id(&self, id: u64) -> Result<()> {
        let next = id
            .checked_add(1)
            .ok_or_else(|| NotifyError::validation(format!("identifier {id} is out of range")))?;
        self.next_id.fetch_max(next, Ordering::Relaxed);
        Ok(())
    }

    // ============ Users ============

    /// Registers a user, replacing any with the same ID.
    pub fn add_user(&self, user: User) {
        debug!(user_id = user.id, username = %user.username, "registered user");
        self.users.write().insert(user.id, user);
    }

    /// Looks up a user.
    #[must_use]
    pub fn user(&self, id: UserId) -> Option<User> {
        self.users.read().get(&id).cloned()
    }

    fn require_user(&self, id: UserId) -> Result<User> {
        self.user(id).ok_or(NotifyError::NotFound { kind: "user", id })
    }

    /// Makes sure the user's account email has a synced email destination.
    ///
    /// An existing synced destination follows an address change. A manual
    /// destination with the new address becomes the synced one instead, and
    /// the previously synced destination is kept as a manual one. Returns
    /// `None` for users without an email address.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotFound` for unknown users and
    /// `NotifyError::UnknownMedium` if email is not registered.
    pub fn sync_user_email(&self, user_id: UserId) -> Result<Option<Destination>> {
        let user = self.require_user(user_id)?;
        let Some(email) = user.email.as_deref() else {
            return Ok(None);
        };
        let medium = self.registry.require(EMAIL_SLUG)?;
        let settings = EmailMedium::settings_for(email);

        let mut destinations = self.destinations.write();
        let owned: Vec<Destination> = destinations
            .values()
            .filter(|d| d.user == user_id && d.media == EMAIL_SLUG)
            .cloned()
            .collect();

        let same_address = |d: &&Destination| medium.has_duplicate(std::slice::from_ref(*d), &settings);
        let previous = owned.iter().find(|d| d.synced).map(|d| d.id);
        let matching = owned
            .iter()
            .filter(same_address)
            .find(|d| d.synced)
            .or_else(|| owned.iter().find(same_address))
            .map(|d| d.id);

        let target = match (matching, previous) {
            (Some(adopted), Some(previous)) if adopted != previous => {
                if let Some(old) = destinations.get_mut(&previous) {
                    old.synced = false;
                }
                debug!(user_id, from = previous, to = adopted, "account email adopted an existing destination");
                Some(adopted)
            }
            (Some(adopted), _) => Some(adopted),
            (None, previous) => previous,
        };

        let synced = match target.and_then(|id| destinations.get_mut(&id)) {
            Some(existing) => {
                existing.settings = settings;
                existing.synced = true;
                existing.clone()
            }
            None => {
                let dest = Destination::new(self.allocate_id()?, user_id, EMAIL_SLUG, settings).synced();
                destinations.insert(dest.id, dest.clone());
                dest
            }
        };
        info!(user_id, destination_id = synced.id, "synced account email destination");
        Ok(Some(synced))
    }

    // ============ Filters ============

    /// Stores a filter under its own ID.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotFound` for an unknown owner,
    /// `NotifyError::NameTaken` for a duplicate name, or the filter's
    /// validation error.
    pub fn add_filter(&self, filter: Filter) -> Result<Filter> {
        self.require_user(filter.user)?;
        let filter = Filter::new(filter.id, filter.user, filter.name, filter.filter)?;

        let mut filters = self.filters.write();
        ensure_name_free(&filters, "filter", filter.user, &filter.name, filter.id)?;
        self.reserve_id(filter.id)?;
        info!(filter_id = filter.id, user_id = filter.user, name = %filter.name, "stored filter");
        filters.insert(filter.id, filter.clone());
        Ok(filter)
    }

    /// Creates a filter with a fresh ID.
    ///
    /// # Errors
    ///
    /// See [`add_filter`](Self::add_filter).
    pub fn create_filter(
        &self,
        user: UserId,
        name: impl Into<String>,
        spec: FilterSpecification,
    ) -> Result<Filter> {
        let filter = Filter::new(self.allocate_id()?, user, name, spec)?;
        self.add_filter(filter)
    }

    /// Replaces a filter's specification.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotFound` or the specification's validation
    /// error.
    pub fn update_filter(&self, id: FilterId, spec: FilterSpecification) -> Result<Filter> {
        spec.validate()?;
        let mut filters = self.filters.write();
        let filter = filters
            .get_mut(&id)
            .ok_or(NotifyError::NotFound { kind: "filter", id })?;
        filter.filter = spec;
        Ok(filter.clone())
    }

    /// Deletes a filter and unlinks it from every profile.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotFound` for unknown filters.
    pub fn delete_filter(&self, id: FilterId) -> Result<Filter> {
        let removed = self
            .filters
            .write()
            .remove(&id)
            .ok_or(NotifyError::NotFound { kind: "filter", id })?;
        self.profile_filters.write().retain(|(_, f)| *f != id);
        info!(filter_id = id, "deleted filter");
        Ok(removed)
    }

    /// Looks up a filter.
    #[must_use]
    pub fn filter(&self, id: FilterId) -> Option<Filter> {
        self.filters.read().get(&id).cloned()
    }

    /// Returns a user's filters.
    #[must_use]
    pub fn filters_for(&self, user: UserId) -> Vec<Filter> {
        self.filters
            .read()
            .values()
            .filter(|f| f.user == user)
            .cloned()
            .collect()
    }

    // ============ Recurrence groups ============

    /// Stores a recurrence group under its own ID.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotFound` for an unknown owner,
    /// `NotifyError::NameTaken` for a duplicate name, or a schedule
    /// validation error.
    pub fn add_group(&self, group: TimeRecurrenceGroup) -> Result<TimeRecurrenceGroup> {
        self.require_user(group.user)?;
        let mut checked = TimeRecurrenceGroup::new(group.id, group.user, group.name)?;
        for recurrence in group.recurrences {
            checked = checked.with_recurrence(TimeRecurrence::new(
                recurrence.days,
                recurrence.start,
                recurrence.end,
            )?);
        }

        let mut groups = self.groups.write();
        ensure_name_free(&groups, "time recurrence group", checked.user, &checked.name, checked.id)?;
        self.reserve_id(checked.id)?;
        info!(group_id = checked.id, user_id = checked.user, name = %checked.name, "stored recurrence group");
        groups.insert(checked.id, checked.clone());
        Ok(checked)
    }

    /// Creates a recurrence group with a fresh ID.
    ///
    /// # Errors
    ///
    /// See [`add_group`](Self::add_group).
    pub fn create_group(
        &self,
        user: UserId,
        name: impl Into<String>,
        recurrences: Vec<TimeRecurrence>,
    ) -> Result<TimeRecurrenceGroup> {
        let mut group = TimeRecurrenceGroup::new(self.allocate_id()?, user, name)?;
        group.recurrences = recurrences;
        self.add_group(group)
    }

    /// Replaces a group's recurrences.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotFound` for unknown groups or a schedule
    /// validation error.
    pub fn set_recurrences(
        &self,
        id: GroupId,
        recurrences: Vec<TimeRecurrence>,
    ) -> Result<TimeRecurrenceGroup> {
        let recurrences = recurrences
            .into_iter()
            .map(|r| TimeRecurrence::new(r.days, r.start, r.end))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut groups = self.groups.write();
        let group = groups.get_mut(&id).ok_or(NotifyError::NotFound {
            kind: "time recurrence group",
            id,
        })?;
        group.recurrences = recurrences;
        Ok(group.clone())
    }

    /// Deletes a group no profile uses.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotFound` for unknown groups and
    /// `NotifyError::Validation` if a profile still owns the group.
    pub fn delete_group(&self, id: GroupId) -> Result<TimeRecurrenceGroup> {
        if let Some(profile) = self
            .profiles
            .read()
            .values()
            .find(|p| p.time_recurrence_group == id)
        {
            return Err(NotifyError::validation(format!(
                "time recurrence group {id} belongs to profile '{}'",
                profile.name
            )));
        }
        self.groups.write().remove(&id).ok_or(NotifyError::NotFound {
            kind: "time recurrence group",
            id,
        })
    }

    /// Looks up a group.
    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<TimeRecurrenceGroup> {
        self.groups.read().get(&id).cloned()
    }

    /// Returns every group.
    #[must_use]
    pub fn groups(&self) -> Vec<TimeRecurrenceGroup> {
        self.groups.read().values().cloned().collect()
    }

    /// Returns every filter.
    #[must_use]
    pub fn filters(&self) -> Vec<Filter> {
        self.filters.read().values().cloned().collect()
    }

    /// Returns a user's groups.
    #[must_use]
    pub fn groups_for(&self, user: UserId) -> Vec<TimeRecurrenceGroup> {
        self.groups
            .read()
            .values()
            .filter(|g| g.user == user)
            .cloned()
            .collect()
    }

    // ============ Destinations ============


    /// Stores a destination under its own ID.
    ///
    /// Manual destinations pass full medium validation; synced ones are only
    /// checked for duplicates.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::UnknownMedium`, `NotifyError::NotFound` for an
    /// unknown owner, or `NotifyError::Validation`.
    pub fn add_destination(&self, destination: Destination) -> Result<Destination> {
        let medium = self.registry.require(&destination.media)?;
        let owner = self.require_user(destination.user)?;

        let mut destinations = self.destinations.write();
        let existing = same_medium(&destinations, owner.id, &destination.media, destination.id);

        let settings = if destination.synced {
            if medium.has_duplicate(&existing, &destination.settings) {
                return Err(NotifyError::validation(format!(
                    "{} destination already exists",
                    medium.name()
                )));
            }
            destination.settings
        } else {
            medium.validate(&destination.settings, &owner, &existing)?
        };

        let stored = Destination {
            settings,
            ..destination
        };
        self.reserve_id(stored.id)?;
        info!(destination_id = stored.id, user_id = stored.user, media = %stored.media, "stored destination");
        destinations.insert(stored.id, stored.clone());
        Ok(stored)
    }

    /// Creates a manual destination with a fresh ID.
    ///
    /// # Errors
    ///
    /// See [`add_destination`](Self::add_destination).
    pub fn create_destination(&self, user: UserId, media: &str, settings: Value) -> Result<Destination> {
        let id = self.allocate_id()?;
        self.add_destination(Destination::new(id, user, media, settings))
    }

    /// Changes a destination's settings.
    ///
    /// The medium may take over the update; for synced email this keeps the
    /// synced address as a new destination. Returns the updated destination.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotFound`, `NotifyError::UnknownMedium` or
    /// `NotifyError::Validation`.
    pub fn update_destination(&self, id: DestinationId, settings: &Value) -> Result<Destination> {
        let current = self
            .destination(id)
            .ok_or(NotifyError::NotFound { kind: "destination", id })?;
        let medium = self.registry.require(&current.media)?;
        let owner = self.require_user(current.user)?;

        let mut destinations = self.destinations.write();
        let current = destinations
            .get(&id)
            .cloned()
            .ok_or(NotifyError::NotFound { kind: "destination", id })?;
        let existing = same_medium(&destinations, owner.id, &current.media, id);
        let validated = medium.validate(settings, &owner, &existing)?;

        let updated = match medium.update(&current, &validated) {
            Some(plan) => {
                if let Some(preserved) = plan.preserved {
                    let copy = Destination {
                        id: self.allocate_id()?,
                        ..preserved
                    };
                    debug!(from = id, to = copy.id, "preserved synced destination");
                    destinations.insert(copy.id, copy);
                }
                plan.updated
            }
            None => Destination {
                settings: validated,
                ..current
            },
        };
        destinations.insert(id, updated.clone());
        Ok(updated)
    }

    /// Returns true if any profile links the destination.
    #[must_use]
    pub fn is_destination_in_use(&self, id: DestinationId) -> bool {
        self.profile_destinations.read().iter().any(|(_, d)| *d == id)
    }

    /// Deletes a destination its medium allows deleting.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotFound`, `NotifyError::UnknownMedium` or
    /// `NotifyError::NotDeletable`.
    pub fn delete_destination(&self, id: DestinationId) -> Result<Destination> {
        let current = self
            .destination(id)
            .ok_or(NotifyError::NotFound { kind: "destination", id })?;
        let medium = self.registry.require(&current.media)?;
        medium.raise_if_not_deletable(&current, self.is_destination_in_use(id))?;

        self.destinations.write().remove(&id);
        info!(destination_id = id, "deleted destination");
        Ok(current)
    }

    /// Looks up a destination.
    #[must_use]
    pub fn destination(&self, id: DestinationId) -> Option<Destination> {
        self.destinations.read().get(&id).cloned()
    }

    /// Returns a user's destinations.
    #[must_use]
    pub fn destinations_for(&self, user: UserId) -> Vec<Destination> {
        self.destinations
            .read()
            .values()
            .filter(|d| d.user == user)
            .cloned()
            .collect()
    }

    /// Returns the medium's label for a destination.
    #[must_use]
    pub fn destination_label(&self, destination: &Destination) -> Option<String> {
        self.registry
            .get(&destination.media)
            .and_then(|medium| medium.get_label(destination))
    }

    // ============ Profiles ============

    fn check_links(&self, user: UserId, filters: &[FilterId], destinations: &[DestinationId]) -> Result<()> {
        {
            let known = self.filters.read();
            for id in filters {
                match known.get(id) {
                    Some(f) if f.user == user => {}
                    Some(_) => {
                        return Err(NotifyError::validation(format!(
                            "filter {id} belongs to another user"
                        )));
                    }
                    None => return Err(NotifyError::NotFound { kind: "filter", id: *id }),
                }
            }
        }
        let known = self.destinations.read();
        for id in destinations {
            match known.get(id) {
                Some(d) if d.user == user => {}
                Some(_) => {
                    return Err(NotifyError::validation(format!(
                        "destination {id} belongs to another user"
                    )));
                }
                None => {
                    return Err(NotifyError::NotFound {
                        kind: "destination",
                        id: *id,
                    });
                }
            }
        }
        Ok(())
    }

    /// Stores a profile and its links.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Validation` for a bad name, a group owned by
    /// another user or already used by another profile, or links to other
    /// users' filters or destinations; `NotifyError::NameTaken` for a
    /// duplicate name; `NotifyError::NotFound` for unknown references.
    pub fn add_profile(&self, draft: NewProfile) -> Result<NotificationProfile> {
        NotificationProfile::validate_name(&draft.name)?;
        self.require_user(draft.user)?;

        let group = self.group(draft.time_recurrence_group).ok_or(NotifyError::NotFound {
            kind: "time recurrence group",
            id: draft.time_recurrence_group,
        })?;
        if group.user != draft.user {
            return Err(NotifyError::validation(format!(
                "time recurrence group {} belongs to another user",
                group.id
            )));
        }
        self.check_links(draft.user, &draft.filters, &draft.destinations)?;

        let id = match draft.id {
            Some(id) => id,
            None => self.allocate_id()?,
        };
        let mut profiles = self.profiles.write();
        ensure_name_free(&profiles, "notification profile", draft.user, &draft.name, id)?;
        if let Some(other) = profiles
            .values()
            .find(|p| p.id != id && p.time_recurrence_group == group.id)
        {
            return Err(NotifyError::validation(format!(
                "time recurrence group {} is already used by profile '{}'",
                group.id, other.name
            )));
        }

        let profile = NotificationProfile {
            id,
            user: draft.user,
            name: draft.name,
            time_recurrence_group: group.id,
            active: draft.active,
        };
        self.reserve_id(id)?;
        profiles.insert(id, profile.clone());
        drop(profiles);

        self.replace_links(id, &draft.filters, &draft.destinations);
        info!(profile_id = id, user_id = profile.user, name = %profile.name, "stored notification profile");
        Ok(profile)
    }

    fn replace_links(&self, profile: ProfileId, filters: &[FilterId], destinations: &[DestinationId]) {
        {
            let mut links = self.profile_filters.write();
            links.retain(|(p, _)| *p != profile);
            links.extend(filters.iter().map(|f| (profile, *f)));
        }
        let mut links = self.profile_destinations.write();
        links.retain(|(p, _)| *p != profile);
        links.extend(destinations.iter().map(|d| (profile, *d)));
    }

    /// Replaces the filters linked to a profile.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotFound` or `NotifyError::Validation`.
    pub fn set_profile_filters(&self, id: ProfileId, filters: &[FilterId]) -> Result<()> {
        let profile = self.require_profile(id)?;
        self.check_links(profile.user, filters, &[])?;
        let mut links = self.profile_filters.write();
        links.retain(|(p, _)| *p != id);
        links.extend(filters.iter().map(|f| (id, *f)));
        Ok(())
    }

    /// Replaces the destinations linked to a profile.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotFound` or `NotifyError::Validation`.
    pub fn set_profile_destinations(&self, id: ProfileId, destinations: &[DestinationId]) -> Result<()> {
        let profile = self.require_profile(id)?;
        self.check_links(profile.user, &[], destinations)?;
        let mut links = self.profile_destinations.write();
        links.retain(|(p, _)| *p != id);
        links.extend(destinations.iter().map(|d| (id, *d)));
        Ok(())
    }

    /// Turns a profile on or off.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotFound` for unknown profiles.
    pub fn set_profile_active(&self, id: ProfileId, active: bool) -> Result<NotificationProfile> {
        let mut profiles = self.profiles.write();
        let profile = profiles.get_mut(&id).ok_or(NotifyError::NotFound {
            kind: "notification profile",
            id,
        })?;
        profile.active = active;
        Ok(profile.clone())
    }

    /// Deletes a profile, its links and its recurrence group.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::NotFound` for unknown profiles.
    pub fn delete_profile(&self, id: ProfileId) -> Result<NotificationProfile> {
        let profile = self.profiles.write().remove(&id).ok_or(NotifyError::NotFound {
            kind: "notification profile",
            id,
        })?;
        self.replace_links(id, &[], &[]);
        self.groups.write().remove(&profile.time_recurrence_group);
        info!(profile_id = id, group_id = profile.time_recurrence_group, "deleted notification profile");
        Ok(profile)
    }

    fn require_profile(&self, id: ProfileId) -> Result<NotificationProfile> {
        self.profile(id).ok_or(NotifyError::NotFound {
            kind: "notification profile",
            id,
        })
    }

    /// Looks up a profile.
    #[must_use]
    pub fn profile(&self, id: ProfileId) -> Option<NotificationProfile> {
        self.profiles.read().get(&id).cloned()
    }

    /// Returns every profile.
    #[must_use]
    pub fn profiles(&self) -> Vec<NotificationProfile> {
        self.profiles.read().values().cloned().collect()
    }

    /// Returns a user's profiles.
    #[must_use]
    pub fn profiles_for(&self, user: UserId) -> Vec<NotificationProfile> {
        self.profiles
            .read()
            .values()
            .filter(|p| p.user == user)
            .cloned()
            .collect()
    }

    /// Returns the filters linked to a profile.
    #[must_use]
    pub fn profile_filters(&self, id: ProfileId) -> Vec<Filter> {
        let ids: Vec<FilterId> = self
            .profile_filters
            .read()
            .iter()
            .filter(|(p, _)| *p == id)
            .map(|(_, f)| *f)
            .collect();
        let filters = self.filters.read();
        ids.iter().filter_map(|f| filters.get(f).cloned()).collect()
    }

    /// Returns the destinations linked to a profile.
    #[must_use]
    pub fn profile_destinations(&self, id: ProfileId) -> Vec<Destination> {
        self.destinations_of([id])
    }

    /// Returns the destinations linked to any of `profiles`, each once.
    pub fn destinations_of(&self, profiles: impl IntoIterator<Item = ProfileId>) -> Vec<Destination> {
        let wanted: BTreeSet<ProfileId> = profiles.into_iter().collect();
        let ids: BTreeSet<DestinationId> = self
            .profile_destinations
            .read()
            .iter()
            .filter(|(p, _)| wanted.contains(p))
            .map(|(_, d)| *d)
            .collect();
        let destinations = self.destinations.read();
        ids.iter()
            .filter_map(|d| destinations.get(d).cloned())
            .collect()
    }

    /// Returns the recurrence group of a profile.
    #[must_use]
    pub fn profile_group(&self, profile: &NotificationProfile) -> Option<TimeRecurrenceGroup> {
        self.group(profile.time_recurrence_group)
    }
}
