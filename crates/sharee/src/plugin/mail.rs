use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::{
    backend::{
        Contact, ContactField, ContactSearchOptions, ContactsProvider, GroupDirectory,
        KnownUserService, TypedAddress,
    },
    cloud_id::{CloudId, CloudIdResolver},
    config::SharingConfig,
    result::{Candidate, SearchResult, SearchResultType},
    share_type::ShareType,
};

use super::{SearchPlugin, Services, UserSession, shares_group};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)+$",
    )
    .expect("email regex is valid")
});

/// Matches `Display Name <user@domain>`
static BRACKETED_ADDRESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^@<>]+@[^<>]+)>$").expect("address regex is valid"));

/// Syntactic validation of an email address. The domain must have at least two labels.
pub fn is_valid_email(address: &str) -> bool {
    EMAIL_REGEX.is_match(address)
}

/// Extracts the address from a query like `Alice <alice@example.org>`
fn bracketed_address(query: &str) -> Option<&str> {
    BRACKETED_ADDRESS_REGEX
        .captures(query)
        .and_then(|captures| captures.get(1))
        .map(|address| address.as_str())
        .filter(|address| is_valid_email(address))
}

/// Searches the address books for email addresses.
///
/// Contacts of the system address book are local users: they are suggested as users instead
/// of emails.
pub struct MailPlugin {
    config: Arc<SharingConfig>,
    contacts: Arc<dyn ContactsProvider>,
    groups: Arc<dyn GroupDirectory>,
    known_users: Arc<dyn KnownUserService>,
    cloud_ids: CloudIdResolver,
}

impl MailPlugin {
    pub fn new(config: Arc<SharingConfig>, services: &Services) -> Self {
        Self {
            config,
            contacts: services.contacts.clone(),
            groups: services.groups.clone(),
            known_users: services.known_users.clone(),
            cloud_ids: services.cloud_ids.clone(),
        }
    }

    /// The local user behind a contact of the system address book
    fn local_user(&self, contact: &Contact) -> Option<CloudId> {
        let cloud_id = match contact.cloud_ids.first() {
            Some(cloud_id) => cloud_id.value().to_string(),
            None => self.cloud_ids.local_cloud_id(contact.uid.as_deref()?),
        };
        self.cloud_ids.resolve_cloud_id(&cloud_id).ok()
    }

    /// Checks if a local user found in the address book can be listed as a partial match
    fn can_enumerate(&self, current_uid: &str, current_groups: &[String], uid: &str) -> bool {
        let enumeration = &self.config.enumeration;

        enumeration.is_unrestricted()
            || (enumeration.restrict_to_phone
                && self.known_users.is_known_to_user(current_uid, uid))
            || (enumeration.restrict_to_group
                && shares_group(self.groups.as_ref(), current_groups, uid))
    }
}

#[async_trait]
impl SearchPlugin for MailPlugin {
    async fn search(
        &self,
        session: &UserSession,
        query: &str,
        limit: usize,
        offset: usize,
        result: &mut SearchResult,
    ) -> bool {
        let enumeration = &self.config.enumeration;
        if enumeration.full_match && !enumeration.full_match_email {
            debug!("Full match on emails is disabled");
            return false;
        }

        let query = bracketed_address(query).unwrap_or(query);
        let current_uid = session.uid();
        let current_groups = self.groups.user_group_ids(current_uid);
        let group_only = self.config.share_with_group_only(&current_groups);

        let contacts = self.contacts.search(
            query,
            &[ContactField::Email, ContactField::FullName],
            ContactSearchOptions {
                limit,
                offset,
                enumeration: enumeration.enabled,
                full_match: enumeration.full_match,
            },
        );

        // The provider already paginated the contacts, all of their addresses are kept
        let has_more = enumeration.enabled && contacts.len() >= limit;

        let lower_query = query.to_lowercase();
        let mut user_wide: Vec<Candidate> = Vec::new();
        let mut exact = Vec::new();
        let mut wide = Vec::new();

        'contacts: for contact in &contacts {
            for address in &contact.emails {
                let email = address.value();
                let label = match &contact.full_name {
                    Some(full_name) => format!("{full_name} ({email})"),
                    None => email.to_string(),
                };
                let exact_address = email.to_lowercase() == lower_query;

                if contact.is_local_system_book {
                    if group_only
                        && !contact.uid.as_deref().is_some_and(|uid| {
                            shares_group(self.groups.as_ref(), &current_groups, uid)
                        })
                    {
                        continue;
                    }

                    if exact_address && enumeration.full_match {
                        let Some(cloud_id) = self.local_user(contact) else {
                            debug!("No local user behind the contact of {email}");
                            continue 'contacts;
                        };

                        if cloud_id.user() != current_uid
                            && !result.has_result(&SearchResultType::USERS, cloud_id.user())
                        {
                            debug!("Email {email} belongs to local user {}", cloud_id.user());
                            let candidate = local_user_candidate(contact, &label, email, &cloud_id);
                            result.add_result_set(
                                &SearchResultType::USERS,
                                Vec::new(),
                                vec![candidate],
                            );
                            result.mark_exact_id_match(&SearchResultType::EMAILS);
                        }
                        return false;
                    }

                    if enumeration.enabled {
                        let Some(cloud_id) = self.local_user(contact) else {
                            debug!("No local user behind the contact of {email}");
                            continue 'contacts;
                        };

                        if cloud_id.user() != current_uid
                            && self.can_enumerate(current_uid, &current_groups, cloud_id.user())
                            && !result.has_result(&SearchResultType::USERS, cloud_id.user())
                            && !user_wide.iter().any(|c| c.share_with() == cloud_id.user())
                        {
                            user_wide.push(local_user_candidate(contact, &label, email, &cloud_id));
                        }
                    }
                    continue;
                }

                let candidate = email_candidate(contact, &label, address);
                let exact_name = contact
                    .full_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase() == lower_query);

                if exact_address || exact_name {
                    if exact_address {
                        result.mark_exact_id_match(&SearchResultType::EMAILS);
                    }
                    exact.push(candidate);
                } else {
                    wide.push(candidate);
                }
            }
        }

        if !enumeration.enabled {
            wide.clear();
            user_wide.clear();
        }

        if !result.has_exact_id_match(&SearchResultType::EMAILS) && is_valid_email(query) {
            exact.push(Candidate::new(query, ShareType::Email, query).with_uuid(query));
        }

        if !user_wide.is_empty() {
            result.add_result_set(&SearchResultType::USERS, user_wide, Vec::new());
        }
        result.add_result_set(&SearchResultType::EMAILS, wide, exact);

        has_more
    }
}

fn local_user_candidate(contact: &Contact, label: &str, email: &str, user: &CloudId) -> Candidate {
    Candidate::new(label, ShareType::User, user.user())
        .with_uuid(contact.uid.as_deref().unwrap_or(email))
        .with_name(contact.full_name.as_deref().unwrap_or(label))
        .with_unique_display_name(if email.is_empty() { user.user() } else { email })
}

fn email_candidate(contact: &Contact, label: &str, address: &TypedAddress) -> Candidate {
    Candidate::new(label, ShareType::Email, address.value())
        .with_uuid(contact.uid.as_deref().unwrap_or(address.value()))
        .with_name(contact.full_name.as_deref().unwrap_or(label))
        .with_address_type(address.kind())
}
