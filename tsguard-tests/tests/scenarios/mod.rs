//! Scenario tests: whole flows over mocked collaborators

mod backup_loop;
mod external;
mod readiness;
mod storage;
