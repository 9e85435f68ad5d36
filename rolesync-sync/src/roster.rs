//! Roster fetcher.
//!
//! Pagination is a lazy, finite producer: [`RosterPages`] issues one request
//! per `next()` and stops on an empty page or a page shorter than the page
//! size. The cursor is the id of the last raw record of the previous page,
//! taken before bots are filtered out. Building a new `RosterPages` restarts
//! from the beginning.

use rolesync_core::{Member, MemberId, RoleMap};

use crate::api::{MemberApi, RemoteMember};
use crate::credential::Credential;
use crate::error::ReconcileError;

/// Sequential page producer over the remote roster.
pub struct RosterPages<'a, A: MemberApi + ?Sized> {
    api: &'a A,
    credential: &'a Credential,
    roles: &'a RoleMap,
    page_size: usize,
    cursor: Option<MemberId>,
    done: bool,
    requests: usize,
}

impl<'a, A: MemberApi + ?Sized> RosterPages<'a, A> {
    pub fn new(
        api: &'a A,
        credential: &'a Credential,
        roles: &'a RoleMap,
        page_size: usize,
    ) -> Self {
        Self {
            api,
            credential,
            roles,
            page_size: page_size.max(1),
            cursor: None,
            done: false,
            requests: 0,
        }
    }

    /// Page requests issued so far.
    pub fn requests(&self) -> usize {
        self.requests
    }

    fn fetch_page(&mut self) -> Result<Option<Vec<RemoteMember>>, ReconcileError> {
        self.requests += 1;
        let page = self
            .api
            .list_members(self.credential, self.cursor.as_ref(), self.page_size)?;

        let Some(last) = page.last() else {
            return Ok(None);
        };
        if self.cursor.as_ref() == Some(&last.user.id) {
            return Err(ReconcileError::Upstream {
                status: None,
                detail: format!("roster cursor did not advance past {}", last.user.id),
            });
        }
        if page.len() < self.page_size {
            self.done = true;
        }
        self.cursor = Some(last.user.id.clone());
        Ok(Some(page))
    }
}

impl<A: MemberApi + ?Sized> Iterator for RosterPages<'_, A> {
    /// Human members of one page, normalized to role flags.
    type Item = Result<Vec<Member>, ReconcileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.fetch_page() {
            Ok(Some(page)) => {
                tracing::debug!(
                    page = self.requests,
                    records = page.len(),
                    "fetched roster page"
                );
                Some(Ok(normalize(page, self.roles)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Drop bots and map role ids into flags.
pub fn normalize(page: Vec<RemoteMember>, roles: &RoleMap) -> Vec<Member> {
    page.into_iter()
        .filter(|record| !record.user.bot)
        .map(|record| Member {
            roles: roles.flags_for(&record.roles),
            id: record.user.id,
            display_name: record.user.username,
        })
        .collect()
}

/// Fetch the complete roster. Any failed page aborts the whole fetch.
pub fn fetch_all_members<A: MemberApi + ?Sized>(
    api: &A,
    credential: &Credential,
    roles: &RoleMap,
    page_size: usize,
) -> Result<Vec<Member>, ReconcileError> {
    let mut pages = RosterPages::new(api, credential, roles, page_size);
    let mut members = Vec::new();
    for page in pages.by_ref() {
        members.extend(page?);
    }
    tracing::info!(
        members = members.len(),
        requests = pages.requests(),
        "roster fetched"
    );
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use rolesync_core::RoleId;

    use crate::error::ApiError;

    /// Serves pre-built pages and records every `after` cursor it sees.
    struct PagedApi {
        pages: Vec<Result<Vec<RemoteMember>, ApiError>>,
        seen: Mutex<Vec<Option<String>>>,
    }

    impl PagedApi {
        fn new(pages: Vec<Result<Vec<RemoteMember>, ApiError>>) -> Self {
            Self {
                pages,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn sized(sizes: &[usize]) -> Self {
            let mut next_id = 1u64;
            let pages = sizes
                .iter()
                .map(|&n| {
                    let page: Vec<RemoteMember> = (0..n)
                        .map(|_| {
                            let id = format!("{next_id:06}");
                            next_id += 1;
                            RemoteMember::new(&id, &format!("user{id}"), false, &[])
                        })
                        .collect();
                    Ok(page)
                })
                .collect();
            Self::new(pages)
        }

        fn cursors(&self) -> Vec<Option<String>> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl MemberApi for PagedApi {
        fn list_members(
            &self,
            _credential: &Credential,
            after: Option<&MemberId>,
            _limit: usize,
        ) -> Result<Vec<RemoteMember>, ApiError> {
            let mut seen = self.seen.lock().unwrap();
            let index = seen.len();
            seen.push(after.map(|a| a.0.clone()));
            self.pages.get(index).cloned().unwrap_or_else(|| Ok(Vec::new()))
        }

        fn add_role(&self, _: &Credential, _: &MemberId, _: &RoleId) -> Result<u16, ApiError> {
            unreachable!("fetcher never mutates")
        }

        fn remove_role(&self, _: &Credential, _: &MemberId, _: &RoleId) -> Result<u16, ApiError> {
            unreachable!("fetcher never mutates")
        }

        fn verify_credential(&self, _: &Credential) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn cred() -> Credential {
        Credential::new("token").unwrap()
    }

    fn roles() -> RoleMap {
        RoleMap::new("111", "222")
    }

    #[test]
    fn three_pages_when_last_is_short() {
        let api = PagedApi::sized(&[1000, 1000, 400]);
        let members = fetch_all_members(&api, &cred(), &roles(), 1000).expect("fetch");
        assert_eq!(members.len(), 2400);
        assert_eq!(api.cursors().len(), 3);
    }

    #[test]
    fn single_request_when_first_page_is_short() {
        let api = PagedApi::sized(&[400]);
        let members = fetch_all_members(&api, &cred(), &roles(), 1000).expect("fetch");
        assert_eq!(members.len(), 400);
        assert_eq!(api.cursors(), vec![None]);
    }

    #[test]
    fn full_last_page_needs_one_empty_probe() {
        let api = PagedApi::sized(&[3, 3]);
        let members = fetch_all_members(&api, &cred(), &roles(), 3).expect("fetch");
        assert_eq!(members.len(), 6);
        assert_eq!(api.cursors().len(), 3);
    }

    #[test]
    fn cursor_is_last_raw_record_even_if_bot() {
        let api = PagedApi::new(vec![
            Ok(vec![
                RemoteMember::new("10", "amy", false, &[]),
                RemoteMember::new("11", "helper-bot", true, &[]),
            ]),
            Ok(vec![RemoteMember::new("12", "bob", false, &[])]),
        ]);
        let members = fetch_all_members(&api, &cred(), &roles(), 2).expect("fetch");
        assert_eq!(api.cursors(), vec![None, Some("11".to_string())]);
        let names: Vec<_> = members.iter().map(|m| m.display_name.as_str()).collect();
        assert_eq!(names, vec!["amy", "bob"]);
    }

    #[test]
    fn role_ids_become_flags() {
        let api = PagedApi::new(vec![Ok(vec![
            RemoteMember::new("1", "a", false, &["111"]),
            RemoteMember::new("2", "b", false, &["222", "999"]),
            RemoteMember::new("3", "c", false, &["111", "222"]),
        ])]);
        let members = fetch_all_members(&api, &cred(), &roles(), 1000).expect("fetch");
        let flags: Vec<_> = members
            .iter()
            .map(|m| (m.roles.is_current, m.roles.is_former))
            .collect();
        assert_eq!(flags, vec![(true, false), (false, true), (true, true)]);
    }

    #[test]
    fn failed_page_aborts_fetch() {
        let api = PagedApi::new(vec![
            Ok(vec![RemoteMember::new("1", "a", false, &[])]),
            Err(ApiError::Status {
                status: 500,
                body: String::new(),
            }),
        ]);
        let err = fetch_all_members(&api, &cred(), &roles(), 1).unwrap_err();
        assert!(matches!(err, ReconcileError::Upstream { status: Some(500), .. }));
    }

    #[test]
    fn rejected_credential_is_auth_error() {
        let api = PagedApi::new(vec![Err(ApiError::Status {
            status: 401,
            body: String::new(),
        })]);
        let err = fetch_all_members(&api, &cred(), &roles(), 1000).unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn stalled_cursor_is_reported_instead_of_looping() {
        let page = vec![RemoteMember::new("5", "a", false, &[])];
        let api = PagedApi::new(vec![Ok(page.clone()), Ok(page)]);
        let err = fetch_all_members(&api, &cred(), &roles(), 1).unwrap_err();
        assert!(err.to_string().contains("did not advance"));
    }

    #[test]
    fn pages_are_lazy() {
        let api = PagedApi::sized(&[2, 2, 1]);
        let cred = cred();
        let roles = roles();
        let mut pages = RosterPages::new(&api, &cred, &roles, 2);
        assert_eq!(pages.requests(), 0);
        assert_eq!(pages.next().expect("page").expect("ok").len(), 2);
        assert_eq!(api.cursors().len(), 1);
        assert_eq!(pages.by_ref().count(), 2);
        assert!(pages.next().is_none());
        assert_eq!(api.cursors().len(), 3);
    }
}
