use ordered_float::OrderedFloat;
use serde_json::Value;

use super::{Fields, FieldSource, Normalize, RawRecord, coerce_text, nested, top};
use crate::{
    Address, Building, BuildingCapabilities, BuildingId, ConsumptionSummary, Device,
    DeviceCategory, DeviceCounts, DeviceId, ExportEligibility, Fluid, Housing, HousingId,
    Invoice, InvoiceId, IssueCounts, IssueId, IssueKind, IssueRecord, Operator, OperatorDetails,
    OperatorId, Ticket, TicketId, TicketStatus, TopConsumer,
};

const ISSUE_LEAKS: &[FieldSource] = &[nested("Alertes", "NbFuites"), top("NbFuites")];
const ISSUE_MALFUNCTIONS: &[FieldSource] = &[
    nested("Alertes", "NbDysfonctionnements"),
    top("NbDysfonctionnements"),
];
const ISSUE_REPAIRS: &[FieldSource] = &[
    nested("Alertes", "NbInterventionsEnCours"),
    top("NbInterventionsEnCours"),
];
const ISSUE_ANOMALIES: &[FieldSource] =
    &[nested("Alertes", "NbAnomalies"), top("NbAnomalies")];

fn issue_counts(fields: Fields<'_>) -> IssueCounts {
    IssueCounts {
        leaks: fields.count(ISSUE_LEAKS),
        malfunctions: fields.count(ISSUE_MALFUNCTIONS),
        repairs_in_progress: fields.count(ISSUE_REPAIRS),
        anomalies: fields.count(ISSUE_ANOMALIES),
    }
}

fn address(fields: Fields<'_>, object: &'static str) -> Address {
    Address {
        line1: fields.text(&[nested(object, "Ligne1"), top("Adresse1"), top("Rue")]),
        line2: fields.text(&[nested(object, "Ligne2"), top("Adresse2")]),
        postal_code: fields.text(&[nested(object, "CodePostal"), top("CodePostal")]),
        city: fields.text(&[nested(object, "Ville"), top("Ville")]),
    }
}

impl Normalize for Building {
    fn normalize(raw: &RawRecord) -> Self {
        let f = Fields::new(raw);

        Building {
            id: BuildingId(f.text(&[top("IdImmeuble"), top("Id")])),
            reference: f.text(&[top("RefImmeuble"), top("Reference")]),
            address: address(f, "Adresse"),
            manager_code: f.text(&[top("CodeGestionnaire")]),
            devices: DeviceCounts {
                cold_water: f.count(&[nested("EF", "NbAppareils"), top("NbAppareilsEF")]),
                hot_water: f.count(&[nested("EC", "NbAppareils"), top("NbAppareilsEC")]),
                heat_cost_allocators: f.count(&[
                    nested("Repart", "NbAppareils"),
                    top("NbRepartiteurs"),
                ]),
                energy_meters: f.count(&[
                    nested("Energie", "NbAppareils"),
                    top("NbCompteursEnergie"),
                ]),
            },
            issues: issue_counts(f),
            first_activation: f.date(&[top("DateMiseEnService")]),
            last_reading: f.date(&[top("DateDerniereReleve")]),
            capabilities: BuildingCapabilities {
                remote_reading: f.flag(&[top("TeleReleve")]),
                invoices: f.flag(&[top("HasFactures"), top("Factures")]),
                heat_cost_allocation: f.flag(&[nested("Repart", "Actif"), top("Repartition")]),
            },
        }
    }
}

fn parse_fluid(code: &str) -> Fluid {
    match code.trim().to_ascii_uppercase().as_str() {
        "EF" | "EAU_FROIDE" | "COLD_WATER" => Fluid::ColdWater,
        "EC" | "EAU_CHAUDE" | "HOT_WATER" => Fluid::HotWater,
        "CHAUFFAGE" | "CHALEUR" | "HEAT" | "CH" => Fluid::Heat,
        "ELEC" | "ELECTRICITE" | "ELECTRICITY" => Fluid::Electricity,
        "GAZ" | "GAS" => Fluid::Gas,
        _ => Fluid::Unknown,
    }
}

fn parse_category(code: &str, fluid: Fluid) -> DeviceCategory {
    match code.trim().to_ascii_uppercase().as_str() {
        "COMPTEUR_EAU" | "EAU" | "WATER_METER" => DeviceCategory::WaterMeter,
        "REPARTITEUR" | "REPART" | "HCA" => DeviceCategory::HeatCostAllocator,
        "COMPTEUR_ENERGIE" | "ENERGIE" | "ENERGY_METER" => DeviceCategory::EnergyMeter,
        _ => match fluid {
            Fluid::ColdWater | Fluid::HotWater => DeviceCategory::WaterMeter,
            Fluid::Electricity | Fluid::Gas => DeviceCategory::EnergyMeter,
            Fluid::Heat | Fluid::Unknown => DeviceCategory::Unknown,
        },
    }
}

impl Normalize for Device {
    fn normalize(raw: &RawRecord) -> Self {
        let f = Fields::new(raw);
        let fluid = parse_fluid(&f.text(&[top("Fluide"), top("TypeFluide")]));

        Device {
            id: DeviceId(f.text(&[top("IdAppareil"), top("Id")])),
            serial_number: f.text(&[top("NumeroSerie"), top("Serie")]),
            location: f.text(&[top("Emplacement"), top("Localisation")]),
            fluid,
            category: parse_category(&f.text(&[top("TypeAppareil"), top("Categorie")]), fluid),
        }
    }
}

impl Normalize for Housing {
    fn normalize(raw: &RawRecord) -> Self {
        let f = Fields::new(raw);

        Housing {
            id: HousingId(f.text(&[top("IdLogement"), top("Id")])),
            building_id: BuildingId(f.text(&[nested("Immeuble", "Id"), top("IdImmeuble")])),
            occupant_reference: f.text(&[nested("Occupant", "Reference"), top("RefOccupant")]),
            occupant_name: f.text(&[nested("Occupant", "Nom"), top("NomOccupant")]),
            floor: f.text(&[top("Etage")]),
            unit_order: f.count(&[top("Ordre"), top("NumeroOrdre")]),
            issues: issue_counts(f),
            devices: f.records(&[top("Appareils"), top("Devices")]),
        }
    }
}

/// Leak, malfunction and repair records share one raw shape, only the
/// identifier key differs.
pub fn normalize_issue(kind: IssueKind, raw: &RawRecord) -> IssueRecord {
    const LEAK_ID: &[FieldSource] = &[top("IdFuite"), top("Id")];
    const DYSFUNCTION_ID: &[FieldSource] = &[top("IdDysfonctionnement"), top("Id")];
    const INTERVENTION_ID: &[FieldSource] = &[top("IdIntervention"), top("Id")];

    let f = Fields::new(raw);
    let own_id = match kind {
        IssueKind::Leak => LEAK_ID,
        IssueKind::Dysfunction => DYSFUNCTION_ID,
        IssueKind::Intervention => INTERVENTION_ID,
    };

    IssueRecord {
        id: IssueId(f.text(own_id)),
        kind,
        device_id: f
            .optional_text(&[nested("Appareil", "Id"), top("IdAppareil")])
            .map(DeviceId),
        device_serial: f.text(&[nested("Appareil", "NumeroSerie"), top("NumeroSerie")]),
        housing_id: f
            .optional_text(&[nested("Logement", "Id"), top("IdLogement")])
            .map(HousingId),
        building_id: f
            .optional_text(&[nested("Immeuble", "Id"), top("IdImmeuble")])
            .map(BuildingId),
        occupant_name: f.text(&[nested("Logement", "NomOccupant"), top("NomOccupant")]),
        day_count: f.count(&[top("NbJours"), top("Duree")]),
        status: f.text(&[top("Statut"), top("Etat")]),
        report: f.text(&[top("Rapport"), top("Commentaire")]),
        detected_on: f.date(&[top("DateDetection"), top("Date")]),
    }
}

/// Parses assigned-building lists that hold either objects or bare ids.
fn building_ids(values: &[Value]) -> impl Iterator<Item = BuildingId> + '_ {
    values.iter().filter_map(|value| {
        let id = match value {
            Value::Object(object) => Fields::new(object).text(&[top("IdImmeuble"), top("Id")]),
            other => coerce_text(other),
        };
        (!id.is_empty()).then_some(BuildingId(id))
    })
}

impl Normalize for Operator {
    fn normalize(raw: &RawRecord) -> Self {
        let f = Fields::new(raw);

        Operator {
            id: OperatorId(f.text(&[top("IdGestionnaire"), top("Id")])),
            first_name: f.text(&[top("Prenom")]),
            last_name: f.text(&[top("Nom")]),
            email: f.text(&[top("Email"), top("Mail")]),
            phone: f.text(&[top("Telephone"), top("Tel")]),
            buildings: building_ids(f.list(&[top("Immeubles"), top("ImmeublesAffectes")]))
                .collect(),
        }
    }
}

impl Normalize for OperatorDetails {
    fn normalize(raw: &RawRecord) -> Self {
        let f = Fields::new(raw);
        let mut operator = Operator::normalize(f.object_or_self("Gestionnaire"));

        let assigned = f.list(&[top("ImmeublesAffectes")]);
        if !assigned.is_empty() {
            operator.buildings = building_ids(assigned).collect();
        }

        let available = f
            .records::<Building>(&[top("ImmeublesDisponibles")])
            .into_iter()
            .filter(|building| !operator.buildings.contains(&building.id))
            .collect();

        OperatorDetails {
            operator,
            available,
        }
    }
}

/// Buckets free-form backend status text into the fixed taxonomy.
pub(crate) fn ticket_status(label: &str) -> TicketStatus {
    let folded: String = label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'à' | 'â' => 'a',
            'ô' => 'o',
            'î' | 'ï' => 'i',
            'û' | 'ù' => 'u',
            'ç' => 'c',
            '_' | '-' => ' ',
            other => other,
        })
        .collect();

    if folded.starts_with("nouv") || folded == "new" || folded == "cree" {
        TicketStatus::New
    } else if folded.contains("planifi") || folded.contains("scheduled") {
        TicketStatus::ScheduledIntervention
    } else if folded.starts_with("clo")
        || folded.starts_with("ferme")
        || folded.starts_with("resolu")
        || folded == "closed"
    {
        TicketStatus::Closed
    } else {
        TicketStatus::Open
    }
}

impl Normalize for Ticket {
    fn normalize(raw: &RawRecord) -> Self {
        let f = Fields::new(raw);
        let status_label = f.text(&[top("Statut"), top("Status")]);

        Ticket {
            id: TicketId(f.text(&[top("IdTicket"), top("Id")])),
            case_number: f.text(&[top("NumeroDossier"), top("Numero")]),
            requester_name: f.text(&[nested("Demandeur", "Nom"), top("NomDemandeur")]),
            requester_email: f.text(&[nested("Demandeur", "Email"), top("EmailDemandeur")]),
            housing_id: f
                .optional_text(&[nested("Logement", "Id"), top("IdLogement")])
                .map(HousingId),
            building_id: f
                .optional_text(&[nested("Immeuble", "Id"), top("IdImmeuble")])
                .map(BuildingId),
            status: ticket_status(&status_label),
            status_label,
            created_at: f.datetime(&[top("DateCreation")]),
            updated_at: f.datetime(&[top("DateModification"), top("DateMaj")]),
        }
    }
}

/// `1234.5` -> `1 234,50 €`.
pub(crate) fn format_amount(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let units = (cents / 100).to_string();
    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, c) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{grouped},{:02} €", cents % 100)
}

impl Normalize for Invoice {
    fn normalize(raw: &RawRecord) -> Self {
        let f = Fields::new(raw);
        let excl = f.number(&[top("MontantHT")]);
        let incl = f.number(&[top("MontantTTC")]);

        Invoice {
            id: InvoiceId(f.text(&[top("IdFacture"), top("Id")])),
            number: f.text(&[top("NumeroFacture"), top("Numero")]),
            building_id: f
                .optional_text(&[nested("Immeuble", "Id"), top("IdImmeuble")])
                .map(BuildingId),
            customer_code: f.text(&[top("CodeClient")]),
            manager_code: f.text(&[top("CodeGestionnaire")]),
            address: address(f, "Immeuble"),
            amount_excl_tax: OrderedFloat(excl),
            amount_incl_tax: OrderedFloat(incl),
            amount_excl_tax_display: f
                .optional_text(&[top("MontantHTFormate")])
                .unwrap_or_else(|| format_amount(excl)),
            amount_incl_tax_display: f
                .optional_text(&[top("MontantTTCFormate")])
                .unwrap_or_else(|| format_amount(incl)),
            edited_on: f.date(&[top("DateEdition")]),
            due_on: f.date(&[top("DateEcheance")]),
        }
    }
}

impl Normalize for ExportEligibility {
    fn normalize(raw: &RawRecord) -> Self {
        let f = Fields::new(raw);

        ExportEligibility {
            building_id: BuildingId(f.text(&[top("IdImmeuble"), top("Id")])),
            leaks: f.flag(&[nested("Exports", "Fuites"), top("ExportFuites")]),
            invoices: f.flag(&[nested("Exports", "Factures"), top("ExportFactures")]),
            consumption: f.flag(&[nested("Exports", "Consommation"), top("ExportConsommation")]),
            housings: f.flag(&[nested("Exports", "Logements"), top("ExportLogements")]),
        }
    }
}

impl Normalize for TopConsumer {
    fn normalize(raw: &RawRecord) -> Self {
        let f = Fields::new(raw);

        TopConsumer {
            housing_id: f.optional_text(&[top("IdLogement")]).map(HousingId),
            occupant_name: f.text(&[top("NomOccupant"), top("Nom")]),
            volume: OrderedFloat(f.number(&[top("Volume"), top("Consommation")])),
        }
    }
}

impl Normalize for ConsumptionSummary {
    fn normalize(raw: &RawRecord) -> Self {
        let f = Fields::new(raw);

        ConsumptionSummary {
            building_id: BuildingId(f.text(&[top("IdImmeuble"), top("Id")])),
            cold_water: f.records(&[
                nested("EF", "TopConsommateurs"),
                top("TopConsommateursEF"),
            ]),
            hot_water: f.records(&[
                nested("EC", "TopConsommateurs"),
                top("TopConsommateursEC"),
            ]),
            heat: f.records(&[
                nested("Repart", "TopConsommateurs"),
                top("TopConsommateursRepart"),
            ]),
        }
    }
}
