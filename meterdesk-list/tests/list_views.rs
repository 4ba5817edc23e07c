use std::collections::BTreeSet;

use meterdesk_core::{
    Address, Building, BuildingId, Device, DeviceCategory, Housing, Invoice, IssueCounts,
    IssueKind, IssueRecord, Operator, Ticket, TicketStatus,
};
use meterdesk_list::views::{
    BuildingColumn, BuildingPredicate, HousingPredicate, InvoiceColumn, IssuePredicate,
    OperatorPredicate, TicketColumn, TicketPredicate,
};
use meterdesk_list::{DEFAULT_PAGE_SIZE, ListState, SortState, view};
use ordered_float::OrderedFloat;
use proptest::prelude::*;

fn building(id: &str, reference: &str, leaks: u32) -> Building {
    Building {
        id: BuildingId::new(id),
        reference: reference.into(),
        issues: IssueCounts {
            leaks,
            ..IssueCounts::default()
        },
        ..Building::default()
    }
}

fn ids<'a>(items: &[&'a Building]) -> Vec<&'a str> {
    items.iter().map(|b| b.id.as_str()).collect()
}

#[test]
fn has_leaks_keeps_buildings_with_leaks_in_order() {
    let buildings = vec![
        building("A", "R1", 0),
        building("B", "R2", 2),
        building("C", "R3", 1),
    ];

    let shown = view(
        &buildings,
        "",
        &[BuildingPredicate::HasLeaks],
        SortState::Unsorted,
        1,
        DEFAULT_PAGE_SIZE,
    );

    assert_eq!(ids(&shown.items), ["B", "C"]);
    assert_eq!(shown.total_count, 2);
    assert_eq!(shown.page_count, 1);
}

#[test]
fn building_search_covers_address_and_city() {
    let mut nord = building("1", "IMM-001", 0);
    nord.address = Address {
        line1: "12 rue des Érables".into(),
        city: "Lille".into(),
        postal_code: "59000".into(),
        ..Address::default()
    };
    let mut sud = building("2", "IMM-002", 0);
    sud.address.city = "Marseille".into();
    let buildings = vec![nord, sud];

    let by_street = view(&buildings, "erables", &[], SortState::Unsorted, 1, 20);
    assert_eq!(ids(&by_street.items), ["1"]);

    let by_city = view(&buildings, "MARS", &[], SortState::Unsorted, 1, 20);
    assert_eq!(ids(&by_city.items), ["2"]);

    let by_postal = view(&buildings, "590", &[], SortState::Unsorted, 1, 20);
    assert_eq!(ids(&by_postal.items), ["1"]);
}

#[test]
fn building_references_sort_naturally() {
    let buildings = vec![
        building("a", "B10", 0),
        building("b", "b9", 0),
        building("c", "B100", 0),
        building("d", "A2", 0),
    ];

    let asc = view(
        &buildings,
        "",
        &[],
        SortState::ascending(BuildingColumn::Reference),
        1,
        20,
    );
    assert_eq!(ids(&asc.items), ["d", "b", "a", "c"]);

    let by_leaks = view(
        &buildings,
        "",
        &[],
        SortState::descending(BuildingColumn::Leaks),
        1,
        20,
    );
    // all zero: ties keep input order
    assert_eq!(ids(&by_leaks.items), ["a", "b", "c", "d"]);
}

#[test]
fn unknown_remote_reading_does_not_match() {
    let mut known = building("1", "R", 0);
    known.capabilities.remote_reading = Some(true);
    let mut off = building("2", "R", 0);
    off.capabilities.remote_reading = Some(false);
    let unknown = building("3", "R", 0);
    let buildings = vec![known, off, unknown];

    let shown = view(
        &buildings,
        "",
        &[BuildingPredicate::HasRemoteReading],
        SortState::Unsorted,
        1,
        20,
    );
    assert_eq!(ids(&shown.items), ["1"]);
}

#[test]
fn list_state_changes_reset_the_page() {
    let buildings: Vec<Building> = (0..45)
        .map(|i| building(&i.to_string(), &format!("R{i}"), i % 3))
        .collect();

    let mut state = ListState::<Building>::default();
    state.set_page(3);
    let shown = state.view(&buildings);
    assert_eq!((shown.page, shown.page_count, shown.items.len()), (3, 3, 5));

    state.toggle_predicate(BuildingPredicate::HasLeaks);
    assert_eq!(state.page(), 1);
    assert_eq!(state.view(&buildings).total_count, 30);

    state.set_page(2);
    state.set_query("R1");
    assert_eq!(state.page(), 1);

    state.set_page(2);
    state.toggle_sort(BuildingColumn::Reference);
    assert_eq!(state.page(), 1);
    assert_eq!(state.sort(), SortState::ascending(BuildingColumn::Reference));

    state.toggle_predicate(BuildingPredicate::HasLeaks);
    assert!(state.predicates().is_empty());

    state.set_page(-4);
    assert_eq!(state.page(), 1);
}

#[test]
fn paging_stays_within_the_shown_pages() {
    let buildings: Vec<Building> = (0..45)
        .map(|i| building(&i.to_string(), &format!("R{i}"), 0))
        .collect();

    let mut state = ListState::<Building>::default();
    for _ in 0..5 {
        let page_count = state.view(&buildings).page_count;
        state.next_page(page_count);
    }
    assert_eq!(state.page(), 3);

    let page_count = state.view(&buildings).page_count;
    state.previous_page(page_count);
    assert_eq!(state.view(&buildings).page, 2);

    // a page set past the end steps back from the last page
    state.set_page(9);
    state.previous_page(page_count);
    assert_eq!(state.page(), 2);

    state.previous_page(page_count);
    state.previous_page(page_count);
    assert_eq!(state.page(), 1);
}

#[test]
fn housings_filter_on_device_category() {
    let metered = Housing {
        occupant_name: "Durand".into(),
        devices: vec![Device {
            category: DeviceCategory::HeatCostAllocator,
            ..Device::default()
        }],
        ..Housing::default()
    };
    let bare = Housing {
        occupant_name: "Petit".into(),
        ..Housing::default()
    };
    let housings = vec![metered, bare];

    let shown = view(
        &housings,
        "",
        &[HousingPredicate::HasDeviceOf(DeviceCategory::HeatCostAllocator)],
        SortState::Unsorted,
        1,
        20,
    );
    assert_eq!(shown.items.len(), 1);
    assert_eq!(shown.items[0].occupant_name, "Durand");

    let none = view(
        &housings,
        "",
        &[HousingPredicate::HasDevices, HousingPredicate::HasLeaks],
        SortState::Unsorted,
        1,
        20,
    );
    assert_eq!(none.total_count, 0);
}

#[test]
fn tickets_filter_by_status_bucket() {
    let ticket = |case: &str, status| Ticket {
        case_number: case.into(),
        status,
        ..Ticket::default()
    };
    let tickets = vec![
        ticket("T-3", TicketStatus::Closed),
        ticket("T-1", TicketStatus::New),
        ticket("T-2", TicketStatus::ScheduledIntervention),
    ];

    let pending = view(
        &tickets,
        "",
        &[TicketPredicate::Pending],
        SortState::ascending(TicketColumn::CaseNumber),
        1,
        20,
    );
    let cases: Vec<&str> = pending.items.iter().map(|t| t.case_number.as_str()).collect();
    assert_eq!(cases, ["T-1", "T-2"]);

    let closed = view(
        &tickets,
        "",
        &[TicketPredicate::Status(TicketStatus::Closed)],
        SortState::Unsorted,
        1,
        20,
    );
    assert_eq!(closed.items[0].case_number, "T-3");
}

#[test]
fn invoice_amounts_sort_by_value() {
    let invoice = |number: &str, amount: f64| Invoice {
        number: number.into(),
        amount_incl_tax: OrderedFloat(amount),
        ..Invoice::default()
    };
    let invoices = vec![
        invoice("F1", 1250.0),
        invoice("F2", 99.9),
        invoice("F3", 0.0),
        invoice("F4", 310.0),
    ];

    let shown = view(
        &invoices,
        "",
        &[meterdesk_list::views::InvoicePredicate::HasAmount],
        SortState::ascending(InvoiceColumn::AmountInclTax),
        1,
        20,
    );
    let numbers: Vec<&str> = shown.items.iter().map(|i| i.number.as_str()).collect();
    assert_eq!(numbers, ["F2", "F4", "F1"]);
}

fn lyon_invoice() -> Invoice {
    Invoice {
        number: "F-2024-118".into(),
        manager_code: "GEST42".into(),
        address: Address {
            line1: "8 avenue Foch".into(),
            line2: "Bât. B".into(),
            postal_code: "69006".into(),
            city: "Lyon".into(),
        },
        amount_incl_tax: OrderedFloat(1200.0),
        amount_incl_tax_display: "1 200,00 €".into(),
        amount_excl_tax: OrderedFloat(1000.0),
        amount_excl_tax_display: "1 000,00 €".into(),
        edited_on: "2024-05-17".parse().ok(),
        due_on: "2024-06-16".parse().ok(),
        ..Invoice::default()
    }
}

fn invoice_matches(invoices: &[Invoice], query: &str) -> usize {
    view(invoices, query, &[], SortState::Unsorted, 1, 20).total_count
}

#[test]
fn invoice_search_covers_manager_and_address() {
    let invoices = vec![lyon_invoice(), Invoice::default()];

    assert_eq!(invoice_matches(&invoices, "gest42"), 1);
    assert_eq!(invoice_matches(&invoices, "FOCH"), 1);
    assert_eq!(invoice_matches(&invoices, "bat. b"), 1);
    assert_eq!(invoice_matches(&invoices, "69006"), 1);
    assert_eq!(invoice_matches(&invoices, "lyon"), 1);
    assert_eq!(invoice_matches(&invoices, "F-2024"), 1);
}

#[test]
fn invoice_search_covers_formatted_amounts_and_dates() {
    let invoices = vec![lyon_invoice(), Invoice::default()];

    assert_eq!(invoice_matches(&invoices, "1 200,00"), 1);
    assert_eq!(invoice_matches(&invoices, "1 000,00 €"), 1);
    assert_eq!(invoice_matches(&invoices, "2024-05-17"), 1);
    assert_eq!(invoice_matches(&invoices, "2024-06"), 1);
    assert_eq!(invoice_matches(&invoices, "1 300"), 0);
}

#[test]
fn credit_notes_sort_before_small_invoices() {
    let invoice = |number: &str, amount: f64| Invoice {
        number: number.into(),
        amount_excl_tax: OrderedFloat(amount),
        ..Invoice::default()
    };
    let invoices = vec![
        invoice("F1", -12.5),
        invoice("F2", 40.0),
        invoice("F3", -50.0),
        invoice("F4", 9.0),
    ];

    let shown = view(
        &invoices,
        "",
        &[],
        SortState::ascending(InvoiceColumn::AmountExclTax),
        1,
        20,
    );
    let numbers: Vec<&str> = shown.items.iter().map(|i| i.number.as_str()).collect();
    assert_eq!(numbers, ["F3", "F1", "F4", "F2"]);

    let shown = view(
        &invoices,
        "",
        &[],
        SortState::descending(InvoiceColumn::AmountExclTax),
        1,
        20,
    );
    let numbers: Vec<&str> = shown.items.iter().map(|i| i.number.as_str()).collect();
    assert_eq!(numbers, ["F2", "F4", "F1", "F3"]);
}

#[test]
fn invoices_sort_by_edition_date() {
    let invoice = |number: &str, edited: &str| Invoice {
        number: number.into(),
        edited_on: edited.parse().ok(),
        ..Invoice::default()
    };
    let invoices = vec![
        invoice("F1", "2024-11-02"),
        invoice("F2", "2023-12-30"),
        invoice("F3", "2024-02-09"),
    ];

    let shown = view(
        &invoices,
        "",
        &[],
        SortState::descending(InvoiceColumn::EditedOn),
        1,
        20,
    );
    let numbers: Vec<&str> = shown.items.iter().map(|i| i.number.as_str()).collect();
    assert_eq!(numbers, ["F1", "F3", "F2"]);
}

#[test]
fn operators_split_by_assignment() {
    let assigned = Operator {
        last_name: "Martin".into(),
        buildings: BTreeSet::from([BuildingId::new("1")]),
        ..Operator::default()
    };
    let idle = Operator {
        last_name: "Bernard".into(),
        ..Operator::default()
    };
    let operators = vec![assigned, idle];

    let shown = view(
        &operators,
        "",
        &[OperatorPredicate::Unassigned],
        SortState::Unsorted,
        1,
        20,
    );
    assert_eq!(shown.items[0].last_name, "Bernard");
    assert_eq!(shown.total_count, 1);
}

#[test]
fn issues_filter_on_duration_and_kind() {
    let issue = |serial: &str, kind, days| IssueRecord {
        device_serial: serial.into(),
        kind,
        day_count: days,
        ..IssueRecord::default()
    };
    let issues = vec![
        issue("S1", IssueKind::Leak, 3),
        issue("S2", IssueKind::Leak, 40),
        issue("S3", IssueKind::Dysfunction, 60),
    ];

    let shown = view(
        &issues,
        "s",
        &[IssuePredicate::Kind(IssueKind::Leak), IssuePredicate::MinDays(30)],
        SortState::Unsorted,
        1,
        20,
    );
    assert_eq!(shown.items.len(), 1);
    assert_eq!(shown.items[0].device_serial, "S2");
}

fn arb_building() -> impl Strategy<Value = Building> {
    ("[0-9]{1,3}", "[A-Ca-c]{0,2}[0-9]{0,3}", 0u32..4, 0u32..3).prop_map(
        |(id, reference, leaks, malfunctions)| Building {
            id: BuildingId::new(id),
            reference,
            issues: IssueCounts {
                leaks,
                malfunctions,
                ..IssueCounts::default()
            },
            ..Building::default()
        },
    )
}

proptest! {
    #[test]
    fn view_is_deterministic(
        buildings in prop::collection::vec(arb_building(), 0..60),
        query in "[a-c0-9]{0,2}",
        page in -3i64..6,
        size in 1usize..25,
    ) {
        let sort = SortState::descending(BuildingColumn::Reference);
        let first = view(&buildings, &query, &[BuildingPredicate::HasLeaks], sort, page, size);
        let second = view(&buildings, &query, &[BuildingPredicate::HasLeaks], sort, page, size);
        prop_assert_eq!(first.items, second.items);
        prop_assert_eq!(first.total_count, second.total_count);
        prop_assert_eq!(first.page, second.page);
    }

    #[test]
    fn pages_partition_the_matches(
        buildings in prop::collection::vec(arb_building(), 0..60),
        size in 1usize..25,
    ) {
        let all = view(&buildings, "", &[], SortState::Unsorted, 1, usize::MAX);
        let first = view(&buildings, "", &[], SortState::Unsorted, 1, size);

        let mut stitched = Vec::new();
        for page in 1..=first.page_count {
            let shown = view(&buildings, "", &[], SortState::Unsorted, page as i64, size);
            prop_assert_eq!(shown.page, page);
            prop_assert!(shown.items.len() <= size);
            stitched.extend(shown.items);
        }
        prop_assert_eq!(stitched, all.items);
        prop_assert!(first.page_count >= 1);
    }

    #[test]
    fn sort_is_stable(buildings in prop::collection::vec(arb_building(), 0..60)) {
        let shown = view(
            &buildings,
            "",
            &[],
            SortState::ascending(BuildingColumn::Leaks),
            1,
            usize::MAX,
        );
        for pair in shown.items.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            prop_assert!(a.issues.leaks <= b.issues.leaks);
            if a.issues.leaks == b.issues.leaks {
                let pos = |x: &Building| buildings.iter().position(|y| std::ptr::eq(x, y));
                prop_assert!(pos(a) < pos(b));
            }
        }
    }
}
