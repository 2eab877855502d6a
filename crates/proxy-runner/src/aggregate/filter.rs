// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory filtering of assembled upstreams.

use crate::model::{ProxyFilter, ProxyUpstream, SortDirection};

/// Filter, sort and page upstreams; returns the page and the pre-page count.
pub fn filter_and_sort_upstreams(
    upstreams: Vec<ProxyUpstream>,
    filter: &ProxyFilter,
) -> (Vec<ProxyUpstream>, usize) {
    let mut selected: Vec<ProxyUpstream> = upstreams
        .into_iter()
        .filter(|u| filter.listen_port.is_none_or(|port| u.listen_port == Some(port)))
        .filter(|u| {
            filter
                .status
                .is_none_or(|status| u.proxy_downstream.iter().any(|d| d.status == status))
        })
        .filter(|u| {
            filter.ref_id.as_ref().is_none_or(|ref_id| {
                u.proxy_downstream
                    .iter()
                    .any(|d| d.ref_id.as_ref() == Some(ref_id))
            })
        })
        .collect();

    match filter.sort_insert_date {
        Some(SortDirection::Asc) => selected.sort_by_key(|u| u.insert_date),
        Some(SortDirection::Desc) => selected.sort_by(|a, b| b.insert_date.cmp(&a.insert_date)),
        None => {}
    }

    filter.pagination.apply(selected)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::model::{
        Pagination, ProxyDownstream, ProxyStatus, ProxyType, Runner, RunnerExec, RunnerService,
        RunnerSocket, RunnerStatus,
    };

    fn upstream(id: &str, port: u16, status: ProxyStatus, age_minutes: i64) -> ProxyUpstream {
        let insert_date = Utc::now() - Duration::minutes(age_minutes);
        ProxyUpstream {
            id: id.into(),
            listen_addr: "203.0.113.5".into(),
            listen_port: Some(port),
            proxy_downstream: vec![ProxyDownstream {
                id: None,
                ref_id: Some(format!("p-{}", id)),
                ip: None,
                mask: None,
                country: None,
                kind: ProxyType::Myst,
                status,
                runner: None,
            }],
            runner: Runner {
                id: id.into(),
                serial: id.into(),
                name: id.into(),
                service: RunnerService::Relay,
                exec: RunnerExec::Docker,
                socket: RunnerSocket::none(),
                label: Vec::new(),
                volumes: Vec::new(),
                status: RunnerStatus::Running,
                insert_date,
            },
            insert_date,
        }
    }

    fn sample() -> Vec<ProxyUpstream> {
        vec![
            upstream("a", 3128, ProxyStatus::Online, 30),
            upstream("b", 3129, ProxyStatus::Offline, 10),
            upstream("c", 3130, ProxyStatus::Online, 20),
        ]
    }

    #[test]
    fn test_filter_by_status_and_sort_desc() {
        let filter = ProxyFilter {
            status: Some(ProxyStatus::Online),
            sort_insert_date: Some(SortDirection::Desc),
            ..ProxyFilter::default()
        };
        let (items, total) = filter_and_sort_upstreams(sample(), &filter);
        assert_eq!(total, 2);
        let ids: Vec<&str> = items.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn test_filter_by_port_and_ref_id() {
        let filter = ProxyFilter {
            listen_port: Some(3129),
            ..ProxyFilter::default()
        };
        let (items, _) = filter_and_sort_upstreams(sample(), &filter);
        assert_eq!(items[0].id, "b");

        let filter = ProxyFilter {
            ref_id: Some("p-c".into()),
            ..ProxyFilter::default()
        };
        let (items, total) = filter_and_sort_upstreams(sample(), &filter);
        assert_eq!((items.len(), total), (1, 1));
    }

    #[test]
    fn test_pagination_keeps_total() {
        let filter = ProxyFilter {
            sort_insert_date: Some(SortDirection::Asc),
            pagination: Pagination {
                page: 2,
                limit: 2,
                skip: false,
            },
            ..ProxyFilter::default()
        };
        let (items, total) = filter_and_sort_upstreams(sample(), &filter);
        assert_eq!(total, 3);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "b");
    }
}
