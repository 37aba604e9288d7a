use orgdir_core::db::open_db_in_memory;
use orgdir_core::{
    Activity, Building, DirectoryQueryService, DirectoryWriter, InMemoryOrganizationStore,
    NewOrganization, Organization, QueryResult, SqliteOrganizationStore,
};
use uuid::Uuid;

type Summary = (Uuid, String, Uuid, Vec<String>, Vec<Uuid>);

/// Phone ids are generated per store, so parity compares everything else.
fn summarize(result: QueryResult<Vec<Organization>>) -> Vec<Summary> {
    result
        .unwrap()
        .into_iter()
        .map(|org| {
            (
                org.id,
                org.name,
                org.building.id,
                org.phones.into_iter().map(|phone| phone.phone).collect(),
                org.activities.into_iter().map(|activity| activity.id).collect(),
            )
        })
        .collect()
}

fn populate<W: DirectoryWriter>(
    writer: &mut W,
    buildings: &[Building],
    activities: &[Activity],
    organizations: &[NewOrganization],
) {
    for building in buildings {
        writer.create_building(building).unwrap();
    }
    for activity in activities {
        writer.create_activity(activity).unwrap();
    }
    for organization in organizations {
        writer.create_organization(organization).unwrap();
    }
}

fn directory() -> (Vec<Building>, Vec<Activity>, Vec<NewOrganization>) {
    let mut buildings = Vec::new();
    for row in 0..6 {
        for col in 0..6 {
            buildings.push(Building::located(
                format!("Grid {row}-{col}"),
                55.70 + row as f64 * 0.01,
                37.55 + col as f64 * 0.01,
            ));
        }
    }
    buildings.push(Building::new("Unmapped", None));
    buildings.push(Building::located("South Pole Station", -90.0, 0.0));
    buildings.push(Building::located("North Pole Camp", 90.0, 0.0));

    let food = Activity::root("Food");
    let meat = Activity::child_of(&food, "Meat");
    let dairy = Activity::child_of(&food, "Dairy");
    let cars = Activity::root("Cars");
    let trucks = Activity::child_of(&cars, "Trucks");
    let parts = Activity::child_of(&trucks, "Parts");
    let activities = vec![food, meat, dairy, cars, trucks, parts];

    let organizations = buildings
        .iter()
        .enumerate()
        .map(|(index, building)| {
            let first = &activities[index % activities.len()];
            let second = &activities[(index * 7 + 3) % activities.len()];
            NewOrganization::new(format!("Org {index:02}"), building.id)
                .with_phone(format!("{index}-000"))
                .with_activity(first.id)
                .with_activity(second.id)
        })
        .collect();

    (buildings, activities, organizations)
}

#[test]
fn memory_and_sqlite_stores_answer_identically() {
    let (buildings, activities, organizations) = directory();

    let mut memory = InMemoryOrganizationStore::new();
    populate(&mut memory, &buildings, &activities, &organizations);
    let memory = DirectoryQueryService::new(memory);

    let conn = open_db_in_memory().unwrap();
    let mut sqlite = SqliteOrganizationStore::try_new(&conn).unwrap();
    populate(&mut sqlite, &buildings, &activities, &organizations);
    let sqlite = DirectoryQueryService::new(sqlite);

    for activity in &activities {
        assert_eq!(
            summarize(memory.by_activity(activity.id)),
            summarize(sqlite.by_activity(activity.id))
        );
        assert_eq!(
            summarize(memory.by_activity_type(activity.id)),
            summarize(sqlite.by_activity_type(activity.id))
        );
    }
    for building in &buildings {
        assert_eq!(
            summarize(memory.by_building(building.id)),
            summarize(sqlite.by_building(building.id))
        );
    }
    for radius in [0.0, 500.0, 2_000.0, 10_000.0] {
        assert_eq!(
            summarize(memory.in_circle(55.73, 37.58, radius)),
            summarize(sqlite.in_circle(55.73, 37.58, radius))
        );
    }
    for (width, height) in [(1_000.0, 4_000.0), (6_000.0, 500.0)] {
        assert_eq!(
            summarize(memory.in_rectangle(55.73, 37.58, width, height)),
            summarize(sqlite.in_rectangle(55.73, 37.58, width, height))
        );
    }
    let from_memory = memory.by_name("Org 07").unwrap().unwrap();
    let from_sqlite = sqlite.by_name("Org 07").unwrap().unwrap();
    assert_eq!(from_memory.id, from_sqlite.id);
    assert_eq!(from_memory.building, from_sqlite.building);
    assert_eq!(from_memory.activities, from_sqlite.activities);
}

#[test]
fn whole_map_circle_excludes_unmapped_and_pole_buildings() {
    let (buildings, activities, organizations) = directory();
    let mut store = InMemoryOrganizationStore::new();
    populate(&mut store, &buildings, &activities, &organizations);
    let service = DirectoryQueryService::new(store);

    let found = service.in_circle(55.73, 37.58, 1.0e8).unwrap();
    assert_eq!(found.len(), 36);
    assert!(found
        .iter()
        .all(|org| org.building.location.is_some_and(|point| point.latitude.abs() < 90.0)));

    let at_north_pole = service.in_circle(90.0, 0.0, 0.0).unwrap_err();
    assert_eq!(at_north_pole.http_status(), 400);
}

#[test]
fn organization_serializes_with_nested_entities() {
    let food = Activity::root("Food");
    let building = Building::located("Lenina 1", 54.98, 82.89);
    let mut store = InMemoryOrganizationStore::new();
    populate(
        &mut store,
        std::slice::from_ref(&building),
        std::slice::from_ref(&food),
        &[NewOrganization::new("Canteen", building.id)
            .with_phone("1-111-111")
            .with_activity(food.id)],
    );
    let service = DirectoryQueryService::new(store);
    let org = service.by_name("Canteen").unwrap().unwrap();

    let json = serde_json::to_value(&org).unwrap();
    assert_eq!(json["name"], "Canteen");
    assert_eq!(json["building"]["address"], "Lenina 1");
    assert_eq!(json["building"]["location"]["latitude"], 54.98);
    assert_eq!(json["phones"][0]["phone"], "1-111-111");
    assert_eq!(json["activities"][0]["name"], "Food");
    assert_eq!(json["activities"][0]["level"], 1);

    let decoded: Organization = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, org);
}
