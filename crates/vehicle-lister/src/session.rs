//! Interactive session state: the sync populator, the current selection and
//! the handlers behind each shell command.

use std::fmt::Write;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{error, info};

use vehicle_lister_core::selection::CarDetail;
use vehicle_lister_core::utils::age_display;
use vehicle_lister_core::{
    BrandQuery, CarQuery, ChassisQuery, ConnectivityMonitor, Selection, Stage, SyncPopulator,
    SyncReport, TierLoader,
};

use crate::commands::{Command, FindArgs, HELP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Session {
    sync: SyncPopulator,
    loader: TierLoader,
    monitor: ConnectivityMonitor,
    /// None until a sync has completed
    selection: Option<Selection>,
}

impl Session {
    pub fn new(sync: SyncPopulator, loader: TierLoader, monitor: ConnectivityMonitor) -> Self {
        Self {
            sync,
            loader,
            monitor,
            selection: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.selection.is_some()
    }

    /// Run the populator and restart the selection from its active brands.
    /// A store failure leaves the session not ready; `sync` can be retried.
    pub async fn sync(&mut self, out: &mut String) -> Result<()> {
        match self.sync.run().await {
            Ok(report) => {
                write_report(out, &report)?;
                self.selection = Some(Selection::from_report(&report, self.loader.clone()));
            }
            Err(e) => {
                error!(error = %e, "Sync failed");
                writeln!(out, "Local store unavailable: {}. Run 'sync' to retry.", e)?;
            }
        }
        Ok(())
    }

    fn selection_mut(&mut self) -> Result<&mut Selection> {
        match self.selection.as_mut() {
            Some(selection) => Ok(selection),
            None => bail!("Not ready: the catalog has not been synced (run 'sync')"),
        }
    }

    pub async fn execute(&mut self, command: Command, out: &mut String) -> Result<Flow> {
        match command {
            Command::List => {
                let selection = self.selection_mut()?;
                write_list(out, selection)?;
            }
            Command::Select(label) => {
                let selection = self.selection_mut()?;
                selection.advance(&label).await?;
                write_list(out, selection)?;
            }
            Command::Back => {
                let selection = self.selection_mut()?;
                selection.retreat().await?;
                write_list(out, selection)?;
            }
            Command::Find(args) => {
                let selection = self.selection_mut()?;
                apply_find(selection, args)?;
                write_list(out, selection)?;
            }
            Command::Show { car_index, json } => {
                match self.loader.car_detail(car_index).await? {
                    Some(detail) if json => {
                        let rendered = serde_json::to_string_pretty(&detail.car)
                            .context("Failed to render car")?;
                        writeln!(out, "{}", rendered)?;
                    }
                    Some(detail) => write_detail(out, &detail)?,
                    None => writeln!(out, "No stored car with index {}", car_index)?,
                }
            }
            Command::Sync => {
                info!("Sync requested");
                self.sync(out).await?;
            }
            Command::Status => self.write_status(out).await?,
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn write_status(&self, out: &mut String) -> Result<()> {
        let store = self.loader.store();
        let counts = store.counts().await?;
        let connectivity = if self.monitor.is_online() { "online" } else { "offline" };

        match &self.selection {
            Some(selection) => writeln!(out, "Stage: {} {}", selection.stage(), breadcrumb(selection))?,
            None => writeln!(out, "Stage: not ready")?,
        }
        writeln!(out, "Connectivity: {}", connectivity)?;
        writeln!(
            out,
            "Stored: {} brands, {} chassis ({} with pictures), {} cars",
            counts.brands, counts.chassis, counts.pictures, counts.cars
        )?;
        let synced = match store.last_synced().await? {
            Some(at) => age_display((Utc::now() - at).num_minutes()),
            None => "never".to_string(),
        };
        writeln!(out, "Last sync: {}", synced)?;
        Ok(())
    }
}

fn apply_find(selection: &mut Selection, args: FindArgs) -> Result<()> {
    match selection.stage() {
        Stage::Brand => {
            selection.filter_brands(&BrandQuery { text: args.text })?;
        }
        Stage::Chassis => {
            selection.filter_chassis(&ChassisQuery {
                text: args.text,
                year: args.year,
            })?;
        }
        Stage::Car => {
            let engine = if args.engine.is_empty() { args.text } else { args.engine };
            let mut query = CarQuery {
                engine,
                year: args.year,
                kw: args.kw,
                hp: args.hp,
                ..CarQuery::default()
            };
            if !args.fuel.is_empty() {
                query.fuel = args.fuel;
            }
            selection.filter_cars(&query)?;
        }
    }
    Ok(())
}

fn breadcrumb(selection: &Selection) -> String {
    [selection.active_brand(), selection.active_chassis()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" > ")
}

fn write_list(out: &mut String, selection: &Selection) -> Result<()> {
    let shown = selection.filtered_indices().len();
    let loaded = selection.tier().len();
    let crumb = breadcrumb(selection);
    if crumb.is_empty() {
        writeln!(out, "[{}] {} of {}", selection.stage(), shown, loaded)?;
    } else {
        writeln!(out, "[{}] {} ({} of {})", selection.stage(), crumb, shown, loaded)?;
    }

    if selection.stage() == Stage::Car {
        for car in selection.filtered_cars() {
            writeln!(
                out,
                "  {:>6}  {}  [{}]  {} kW / {} hp  {}  {}",
                car.car_index, car.engine, car.engine_code, car.kw, car.hp, car.fuel, car.year
            )?;
        }
    } else {
        for label in selection.labels() {
            writeln!(out, "  {}", label)?;
        }
    }
    Ok(())
}

fn write_detail(out: &mut String, detail: &CarDetail) -> Result<()> {
    let car = &detail.car;
    writeln!(out, "{} {} {}", car.brand, car.chassis, car.engine)?;
    writeln!(out, "  Engine code: {}", car.engine_code)?;
    writeln!(out, "  Power:       {} kW / {} hp", car.kw, car.hp)?;
    writeln!(out, "  Fuel:        {}", car.fuel)?;
    writeln!(out, "  Years:       {}", car.year)?;
    match &detail.chassis {
        Some(chassis) => {
            let picture = match &chassis.picture {
                Some(bytes) => format!("{} bytes", bytes.len()),
                None => "none".to_string(),
            };
            writeln!(out, "  Chassis:     {} ({})", chassis.name, chassis.year)?;
            writeln!(out, "  Picture:     {}", picture)?;
        }
        None => writeln!(out, "  Chassis:     not stored")?,
    }
    Ok(())
}

fn write_report(out: &mut String, report: &SyncReport) -> Result<()> {
    if report.online {
        writeln!(
            out,
            "Synced: {} queries, {} cars, {} chassis, {} pictures",
            report.queries_issued, report.cars_stored, report.chassis_stored, report.pictures_attached
        )?;
    } else {
        writeln!(out, "Offline: using the stored catalog")?;
    }
    for failure in &report.failures {
        writeln!(out, "  warning: {}", failure)?;
    }
    writeln!(out, "{} brands available", report.active_brands.len())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use vehicle_lister_core::config::SyncConfig;
    use vehicle_lister_core::remote::{AssetError, AssetFetcher, RemoteResult, RemoteSource};
    use vehicle_lister_core::{Car, Chassis, FileStore, LocalStore};

    use super::*;

    struct NoRemote;

    #[async_trait]
    impl RemoteSource for NoRemote {
        async fn first_car_from(&self, _min_index: u32) -> RemoteResult<Option<Car>> {
            Ok(None)
        }
        async fn chassis_by_indexes(&self, _indexes: &[u32]) -> RemoteResult<Vec<Chassis>> {
            Ok(Vec::new())
        }
        async fn chassis_by_brand(&self, _brand: &str) -> RemoteResult<Vec<Chassis>> {
            Ok(Vec::new())
        }
        async fn cars_by_chassis(&self, _chassis: &str) -> RemoteResult<Vec<Car>> {
            Ok(Vec::new())
        }
    }

    struct NoAssets;

    #[async_trait]
    impl AssetFetcher for NoAssets {
        async fn fetch(&self, _chassis_index: u32) -> Result<Vec<u8>, AssetError> {
            Err(AssetError::Empty)
        }
    }

    fn car(car_index: u32, engine: &str, kw: &str) -> Car {
        Car {
            car_index,
            chassis_index: 7,
            brand: "BMW".to_string(),
            chassis: "3 Series (E46)".to_string(),
            engine: engine.to_string(),
            engine_code: "M54B30".to_string(),
            year: "2000/06 - 2005/12 E46".to_string(),
            kw: kw.to_string(),
            hp: String::new(),
            fuel: "Petrol".to_string(),
        }
    }

    async fn offline_session() -> Session {
        let store = Arc::new(FileStore::in_memory());
        store
            .upsert_chassis(Chassis {
                chassis_index: 7,
                brand: "BMW".to_string(),
                name: "3 Series (E46)".to_string(),
                year: "1998/02 - 2005/12 E46".to_string(),
                has_img: false,
                picture: None,
            })
            .await
            .unwrap();
        store.upsert_car(car(40, "330i", "170")).await.unwrap();
        store.upsert_car(car(41, "318i", "85")).await.unwrap();

        let monitor = ConnectivityMonitor::new(false);
        let sync = SyncPopulator::new(
            store.clone(),
            Arc::new(NoRemote),
            Arc::new(NoAssets),
            monitor.clone(),
            SyncConfig::default(),
            Duration::from_secs(1),
        );
        let loader = TierLoader::new(store);
        Session::new(sync, loader, monitor)
    }

    async fn run(session: &mut Session, line: &str) -> Result<String> {
        let mut out = String::new();
        session.execute(Command::parse(line)?, &mut out).await?;
        Ok(out)
    }

    #[tokio::test]
    async fn test_not_ready_before_sync() {
        let mut session = offline_session().await;
        assert!(!session.is_ready());
        assert!(run(&mut session, "list").await.is_err());
        // Store reads work without a selection
        assert!(run(&mut session, "show 40").await.unwrap().contains("330i"));
    }

    #[tokio::test]
    async fn test_drill_down_and_back() {
        let mut session = offline_session().await;
        run(&mut session, "sync").await.unwrap();
        assert!(session.is_ready());

        let brands = run(&mut session, "list").await.unwrap();
        assert!(brands.contains("BMW"));

        let chassis = run(&mut session, "select bmw").await.unwrap();
        assert!(chassis.contains("3 Series (E46)"));

        let cars = run(&mut session, "select 3 Series (E46)").await.unwrap();
        assert!(cars.contains("330i"));
        assert!(cars.contains("318i"));

        let filtered = run(&mut session, "find kw=168").await.unwrap();
        assert!(filtered.contains("330i"));
        assert!(!filtered.contains("318i"));

        let back = run(&mut session, "back").await.unwrap();
        assert!(back.starts_with("[chassis]"));
        run(&mut session, "back").await.unwrap();
        let top = run(&mut session, "back").await.unwrap();
        assert!(top.starts_with("[brand]"));
        assert!(top.contains("BMW"));
    }

    #[tokio::test]
    async fn test_invalid_year_is_reported() {
        let mut session = offline_session().await;
        run(&mut session, "sync").await.unwrap();
        run(&mut session, "select BMW").await.unwrap();
        let err = run(&mut session, "find year=20").await.unwrap_err();
        assert!(err.to_string().contains("20"));
        let listed = run(&mut session, "list").await.unwrap();
        assert!(listed.contains("3 Series (E46)"));
    }

    #[tokio::test]
    async fn test_status_and_show_json() {
        let mut session = offline_session().await;
        run(&mut session, "sync").await.unwrap();
        let status = run(&mut session, "status").await.unwrap();
        assert!(status.contains("offline"));
        assert!(status.contains("2 cars"));
        assert!(status.contains("Last sync: never"));

        let json = run(&mut session, "show 41 --json").await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["carIndex"], 41);
        assert!(run(&mut session, "show 999").await.unwrap().contains("No stored car"));
    }
}
