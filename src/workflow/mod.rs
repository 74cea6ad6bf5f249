//! # 声子工作流
//!
//! 编排一次完整的声子计算：
//! 1. 生成位移超胞
//! 2. 新提交计算，或从目录/记录库导入已有结果
//! 3. 检查导入记录的结构一致性
//! 4. 组装力集与 NAC 参数
//! 5. 按运行计划停止、提交远程 phonopy 作业或在本地计算声子性质
//!
//! 作业的提交与等待交给 [`Engine`]，物理计算交给 [`PhononLibrary`]。
//! 已发布的输出在任何一步失败后仍然可以取回。
//!
//! ## 依赖关系
//! - 被 `commands/run.rs`、`commands/plan.rs`、`commands/init.rs` 使用
//! - 使用 `engine/`、`phonopy/`、`models/`、`utils/output.rs`
//! - 子模块: assembly, context, inputs, mode, outputs

pub mod assembly;
pub mod context;
pub mod inputs;
pub mod mode;
pub mod outputs;

pub use context::WorkflowContext;
pub use inputs::WorkflowInputs;
pub use mode::{Acquisition, CalculationNodes, ImmigrantFolders, Postprocess, RunPlan};
pub use outputs::WorkflowOutputs;

use crate::engine::{Engine, ImmigrantRequest, JobRequest, PhonopyJob};
use crate::error::{PhonoflowError, Result};
use crate::models::{CalcSlot, CalcType, Crystal};
use crate::phonopy::{PhononLibrary, SupercellSetup};
use crate::utils::output::{print_info, print_step, print_success, print_warning};

pub struct PhononWorkflow<'a, E: Engine, L: PhononLibrary> {
    inputs: WorkflowInputs,
    structure: Crystal,
    plan: RunPlan,
    engine: &'a mut E,
    library: &'a L,
    ctx: WorkflowContext,
    outputs: WorkflowOutputs,
}

impl<'a, E: Engine, L: PhononLibrary> PhononWorkflow<'a, E, L> {
    /// 校验输入；任何致命的输入错误都在这里返回
    pub fn new(
        inputs: WorkflowInputs,
        structure: Crystal,
        engine: &'a mut E,
        library: &'a L,
    ) -> Result<Self> {
        let plan = inputs.plan()?;
        Ok(PhononWorkflow {
            inputs,
            structure,
            plan,
            engine,
            library,
            ctx: WorkflowContext::new(),
            outputs: WorkflowOutputs::default(),
        })
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    pub fn outputs(&self) -> &WorkflowOutputs {
        &self.outputs
    }

    pub fn into_outputs(self) -> WorkflowOutputs {
        self.outputs
    }

    /// 按计划依次执行各步骤
    pub fn run(&mut self) -> Result<()> {
        self.initialize_supercell_phonon_calculation()?;

        match self.plan.acquisition.clone() {
            Acquisition::Fresh => self.run_force_and_nac_calculations()?,
            Acquisition::ImportFolders(folders) => {
                self.import_calculations_from_files(&folders)?
            }
            Acquisition::ImportRecords(nodes) => self.import_calculations_from_nodes(&nodes)?,
        }

        if self.plan.is_import() {
            self.check_imported_structures()?;
        }

        self.create_force_sets()?;
        if self.plan.is_nac {
            self.create_nac_params()?;
        }

        match self.plan.postprocess.clone() {
            Postprocess::DryRun => {
                print_info("Dry run: stopping after force sets were assembled.");
            }
            Postprocess::Remote(remote) => self.run_phonopy_remote(remote)?,
            Postprocess::Local => self.run_phonopy_local()?,
        }

        print_success(&format!(
            "Workflow finished with outputs: {}",
            self.outputs.published().join(", ")
        ));
        Ok(())
    }

    fn setup(&self) -> Result<&SupercellSetup> {
        self.ctx
            .setup
            .as_ref()
            .ok_or_else(|| PhonoflowError::Other("supercells have not been initialized".to_string()))
    }

    /// 生成位移超胞并发布设置记录、原胞与超胞
    pub fn initialize_supercell_phonon_calculation(&mut self) -> Result<()> {
        print_step("Initializing supercell phonon calculation");

        let setup = self.library.phonon_setting_info(
            &self.inputs.phonon_settings,
            &self.structure,
            self.inputs.symmetry_tolerance,
            self.inputs.displacement_dataset.as_ref(),
        )?;

        let n = setup.supercells.len();
        if n != setup.phonon_setting_info.num_supercells() {
            return Err(PhonoflowError::PhonopyError {
                task: "setting_info".to_string(),
                reason: format!(
                    "{} supercells returned for {} displacements",
                    n,
                    setup.phonon_setting_info.num_supercells()
                ),
            });
        }
        print_info(&format!("{} displaced supercell(s) generated", n));

        self.outputs.phonon_setting_info = Some(setup.phonon_setting_info.clone());
        self.outputs.primitive = Some(setup.primitive.clone());
        self.outputs.supercell = Some(setup.supercell.clone());
        self.outputs.supercells = setup.supercells.clone();

        self.ctx.reset_calcs(n);
        self.ctx.setup = Some(setup);
        Ok(())
    }

    /// 提交全部受力计算（以及原胞上的 NAC 计算），然后统一等待
    pub fn run_force_and_nac_calculations(&mut self) -> Result<()> {
        print_step("Submitting force and NAC calculations");

        let settings = self
            .inputs
            .calculator_settings
            .as_ref()
            .ok_or_else(|| PhonoflowError::MissingSetting("calculator_settings".to_string()))?;
        let setup = self.setup()?;

        let mut requests: Vec<JobRequest> = setup
            .supercells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                JobRequest::vasp(
                    CalcSlot::Supercell(i + 1),
                    cell.clone(),
                    settings.for_type(CalcType::Forces).clone(),
                )
            })
            .collect();
        if self.plan.is_nac {
            requests.push(JobRequest::vasp(
                CalcSlot::Nac,
                setup.primitive.clone(),
                settings.for_type(CalcType::Nac).clone(),
            ));
        }

        let mut handles = Vec::with_capacity(requests.len());
        for request in requests {
            handles.push(self.engine.submit(request)?);
        }

        let records = self.engine.wait_calculations(&handles)?;
        for record in records {
            self.ctx.store(record);
        }
        Ok(())
    }

    /// 从已有计算目录导入
    pub fn import_calculations_from_files(&mut self, folders: &ImmigrantFolders) -> Result<()> {
        print_step("Importing calculations from folders");

        let n = self.ctx.supercell_calcs.len();
        warn_extra("folder", folders.force.len(), n);

        let mut requests: Vec<ImmigrantRequest> = folders
            .force
            .iter()
            .take(n)
            .enumerate()
            .map(|(i, folder)| ImmigrantRequest {
                slot: CalcSlot::Supercell(i + 1),
                folder: folder.clone(),
            })
            .collect();
        if self.plan.is_nac {
            let folder = folders.nac.first().ok_or_else(|| {
                PhonoflowError::MissingSetting("immigrant_calculation_folders.nac".to_string())
            })?;
            requests.push(ImmigrantRequest {
                slot: CalcSlot::Nac,
                folder: folder.clone(),
            });
        }

        let mut handles = Vec::with_capacity(requests.len());
        for request in requests {
            handles.push(self.engine.immigrate(request)?);
        }

        let records = self.engine.wait_calculations(&handles)?;
        for record in records {
            self.ctx.store(record);
        }
        Ok(())
    }

    /// 从记录库导入，不做任何计算
    pub fn import_calculations_from_nodes(&mut self, nodes: &CalculationNodes) -> Result<()> {
        print_step("Importing calculations from stored records");

        let n = self.ctx.supercell_calcs.len();
        warn_extra("record", nodes.force.len(), n);

        for (i, node_id) in nodes.force.iter().take(n).enumerate() {
            let mut record = self.engine.load_record(node_id)?;
            record.slot = CalcSlot::Supercell(i + 1);
            self.ctx.store(record);
        }

        if self.plan.is_nac {
            let node_id = nodes
                .nac
                .first()
                .ok_or_else(|| PhonoflowError::MissingSetting("calculation_nodes.nac".to_string()))?;
            let mut record = self.engine.load_record(node_id)?;
            record.slot = CalcSlot::Nac;
            self.ctx.store(record);
        }
        Ok(())
    }

    pub fn check_imported_structures(&self) -> Result<()> {
        print_step("Checking imported supercell structures");
        let setup = self.setup()?;
        assembly::check_consistency(
            &setup.supercells,
            &self.ctx.supercell_calcs,
            self.inputs.symmetry_tolerance,
        )
    }

    pub fn create_force_sets(&mut self) -> Result<()> {
        print_step("Creating force sets");
        let n = self.ctx.supercell_calcs.len();
        let force_sets = assembly::assemble_force_sets(n, &self.ctx.supercell_calcs)?;
        if force_sets.energies.is_none() {
            print_warning("Energies are not available for every supercell and were not stored.");
        }
        self.outputs.force_sets = Some(force_sets);
        Ok(())
    }

    /// 对称化 Born 电荷与介电张量；导入时额外传入工作流的原胞
    pub fn create_nac_params(&mut self) -> Result<()> {
        print_step("Creating NAC params");

        let setup = self.setup()?;
        let record = self.ctx.nac_calc.as_ref().ok_or_else(|| PhonoflowError::MissingResult {
            field: "born_charges".to_string(),
            label: CalcSlot::Nac.label(),
        })?;
        let (born, epsilon) = assembly::nac_fields(record)?;

        let (nac_structure, primitive) = if self.plan.is_import() {
            (
                record.structure.as_ref().unwrap_or(&self.structure),
                Some(&setup.primitive),
            )
        } else {
            (record.structure.as_ref().unwrap_or(&setup.primitive), None)
        };

        let nac = self.library.nac_params(
            &born,
            &epsilon,
            nac_structure,
            primitive,
            self.inputs.symmetry_tolerance,
        )?;
        self.outputs.nac_params = Some(nac);
        Ok(())
    }

    fn assembled(&self) -> Result<(&SupercellSetup, &crate::models::ForceSets)> {
        let setup = self.setup()?;
        let force_sets = self
            .outputs
            .force_sets
            .as_ref()
            .ok_or_else(|| PhonoflowError::Other("force sets have not been created".to_string()))?;
        Ok((setup, force_sets))
    }

    /// 提交远程 phonopy 作业，结果原样作为工作流输出
    pub fn run_phonopy_remote(&mut self, remote: mode::RemotePhonopy) -> Result<()> {
        print_step("Running phonopy remotely");

        let (setup, force_sets) = self.assembled()?;
        let job = PhonopyJob {
            unitcell: self.structure.clone(),
            setting_info: setup.phonon_setting_info.clone(),
            force_sets: force_sets.clone(),
            nac_params: self.outputs.nac_params.clone(),
            code_string: remote.code_string,
            options: remote.options,
        };

        let handle = self.engine.submit(JobRequest::phonopy(job))?;
        let results = self.engine.wait_phonopy(&handle)?;

        self.outputs.thermal_properties = Some(results.thermal_properties);
        self.outputs.dos = Some(results.dos);
        self.outputs.pdos = Some(results.pdos);
        self.outputs.band_structure = Some(results.band_structure);
        self.outputs.force_constants = Some(results.force_constants);
        Ok(())
    }

    /// 在本地计算力常数与声子性质（不含 PDOS）
    pub fn run_phonopy_local(&mut self) -> Result<()> {
        print_step("Running phonopy locally");

        let (setup, force_sets) = self.assembled()?;
        let info = &setup.phonon_setting_info;

        let force_constants = self
            .library
            .force_constants(&self.structure, info, force_sets)?;
        let properties = self.library.phonon_properties(
            &self.structure,
            info,
            &force_constants,
            self.outputs.nac_params.as_ref(),
        )?;

        self.outputs.force_constants = Some(force_constants);
        self.outputs.thermal_properties = Some(properties.thermal_properties);
        self.outputs.dos = Some(properties.dos);
        self.outputs.band_structure = Some(properties.band_structure);
        Ok(())
    }
}

fn warn_extra(kind: &str, given: usize, expected: usize) {
    if given > expected {
        print_warning(&format!(
            "{} force {}(s) given for {} supercell(s); the last {} are ignored.",
            given,
            kind,
            expected,
            given - expected
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{JobHandle, JobKind, VaspJob};
    use crate::models::calculation::{ENERGY_NO_ENTROPY, FINAL_FORCES};
    use crate::models::settings::AtomDisplacement;
    use crate::models::{
        Atom, BandStructure, CalcOutputs, CalculationRecord, DisplacementDataset, Dos,
        ForceConstants, ForceSets, Lattice, LocalPhonon, Misc, NacParams, Pdos,
        PhononSettingInfo, PhononSettings, PhonopyOutputs, RecordOrigin, ThermalProperties,
        VASP_NAC_FACTOR,
    };
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    // ─── fakes ───────────────────────────────────────────────────

    struct FakeLibrary {
        num_displacements: usize,
        calls: RefCell<Vec<&'static str>>,
        nac_primitive: RefCell<Option<Crystal>>,
    }

    impl FakeLibrary {
        fn new(num_displacements: usize) -> Self {
            FakeLibrary {
                num_displacements,
                calls: RefCell::new(Vec::new()),
                nac_primitive: RefCell::new(None),
            }
        }

        fn called(&self, name: &str) -> bool {
            self.calls.borrow().iter().any(|c| *c == name)
        }
    }

    fn unitcell() -> Crystal {
        Crystal::new(
            "Po",
            Lattice::from_vectors([[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]]),
            vec![Atom::new("Po", [0.0, 0.0, 0.0])],
        )
    }

    fn perfect_supercell() -> Crystal {
        let mut atoms = Vec::new();
        for i in 0..2 {
            for j in 0..2 {
                for k in 0..2 {
                    atoms.push(Atom::new(
                        "Po",
                        [i as f64 * 0.5, j as f64 * 0.5, k as f64 * 0.5],
                    ));
                }
            }
        }
        Crystal::new(
            "Po8",
            Lattice::from_vectors([[6.0, 0.0, 0.0], [0.0, 6.0, 0.0], [0.0, 0.0, 6.0]]),
            atoms,
        )
    }

    impl PhononLibrary for FakeLibrary {
        fn phonon_setting_info(
            &self,
            settings: &PhononSettings,
            _structure: &Crystal,
            symmetry_tolerance: f64,
            _dataset: Option<&DisplacementDataset>,
        ) -> Result<SupercellSetup> {
            self.calls.borrow_mut().push("phonon_setting_info");
            let supercell = perfect_supercell();
            let mut first_atoms = Vec::new();
            let mut supercells = Vec::new();
            for n in 0..self.num_displacements {
                first_atoms.push(AtomDisplacement {
                    number: n,
                    displacement: [settings.distance, 0.0, 0.0],
                });
                let mut cell = supercell.clone();
                cell.atoms[n].position[0] += settings.distance / 6.0;
                supercells.push(cell);
            }
            let info = PhononSettingInfo {
                supercell_matrix: settings
                    .supercell_matrix
                    .map(|m| m.to_matrix())
                    .unwrap_or_default(),
                primitive_matrix: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
                mesh: settings.mesh,
                distance: settings.distance,
                is_nac: settings.is_nac,
                symmetry_tolerance,
                displacement_dataset: DisplacementDataset {
                    natom: supercell.num_atoms(),
                    first_atoms,
                },
                version: Some("fake".to_string()),
            };
            Ok(SupercellSetup {
                phonon_setting_info: info,
                primitive: unitcell(),
                supercell,
                supercells,
            })
        }

        fn nac_params(
            &self,
            born_charges: &[[[f64; 3]; 3]],
            dielectric: &[[f64; 3]; 3],
            structure: &Crystal,
            primitive: Option<&Crystal>,
            _symmetry_tolerance: f64,
        ) -> Result<NacParams> {
            self.calls.borrow_mut().push("nac_params");
            *self.nac_primitive.borrow_mut() = primitive.cloned();
            Ok(NacParams {
                born_charges: born_charges.to_vec(),
                dielectric: *dielectric,
                primitive: primitive.cloned().unwrap_or_else(|| structure.clone()),
                factor: VASP_NAC_FACTOR,
                independent_atoms: vec![0],
            })
        }

        fn force_constants(
            &self,
            _structure: &Crystal,
            info: &PhononSettingInfo,
            _force_sets: &ForceSets,
        ) -> Result<ForceConstants> {
            self.calls.borrow_mut().push("force_constants");
            let natom = info.displacement_dataset.natom;
            Ok(ForceConstants {
                force_constants: vec![vec![[[0.0; 3]; 3]; natom]; natom],
            })
        }

        fn phonon_properties(
            &self,
            _structure: &Crystal,
            _info: &PhononSettingInfo,
            _force_constants: &ForceConstants,
            _nac_params: Option<&NacParams>,
        ) -> Result<LocalPhonon> {
            self.calls.borrow_mut().push("phonon_properties");
            Ok(local_phonon())
        }
    }

    fn local_phonon() -> LocalPhonon {
        LocalPhonon {
            thermal_properties: ThermalProperties {
                temperatures: vec![0.0, 10.0],
                free_energy: vec![1.0, 0.9],
                entropy: vec![0.0, 0.1],
                heat_capacity: vec![0.0, 0.2],
            },
            dos: Dos {
                frequencies: vec![0.0, 1.0],
                total_dos: vec![0.0, 0.3],
            },
            band_structure: BandStructure {
                qpoints: vec![[0.0; 3], [0.5, 0.0, 0.0]],
                distances: vec![0.0, 0.1],
                frequencies: vec![vec![0.0, 0.0, 0.0], vec![2.0, 2.0, 3.0]],
                labels: vec!["G".to_string(), "X".to_string()],
            },
        }
    }

    fn phonopy_outputs() -> PhonopyOutputs {
        let local = local_phonon();
        PhonopyOutputs {
            thermal_properties: local.thermal_properties,
            dos: local.dos,
            pdos: Pdos {
                frequencies: vec![0.0, 1.0],
                projected_dos: vec![vec![0.0, 0.3]],
            },
            band_structure: local.band_structure,
            force_constants: ForceConstants {
                force_constants: vec![vec![[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]]],
            },
        }
    }

    fn force_outputs(n: usize, natom: usize) -> CalcOutputs {
        CalcOutputs {
            forces: Some(BTreeMap::from([(
                FINAL_FORCES.to_string(),
                vec![[0.01 * n as f64, 0.0, 0.0]; natom],
            )])),
            misc: Some(Misc {
                total_energies: Some(BTreeMap::from([(
                    ENERGY_NO_ENTROPY.to_string(),
                    -(n as f64),
                )])),
            }),
            ..Default::default()
        }
    }

    fn nac_outputs(born: bool, epsilon: bool) -> CalcOutputs {
        CalcOutputs {
            born_charges: born.then(|| vec![[[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]]),
            dielectrics: epsilon.then_some([[9.0, 0.0, 0.0], [0.0, 9.0, 0.0], [0.0, 0.0, 9.0]]),
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct FakeEngine {
        vasp_jobs: Vec<VaspJob>,
        phonopy_jobs: Vec<PhonopyJob>,
        immigrated: Vec<ImmigrantRequest>,
        missing_forces: Vec<usize>,
        nac_outputs: CalcOutputs,
        folder_records: BTreeMap<PathBuf, CalculationRecord>,
        stored: BTreeMap<String, CalculationRecord>,
        phonopy_outputs: Option<PhonopyOutputs>,
        waits: usize,
    }

    impl Engine for FakeEngine {
        fn submit(&mut self, request: JobRequest) -> Result<JobHandle> {
            let label = request.label();
            match request {
                JobRequest::Vasp(job) => {
                    let slot = job.slot;
                    self.vasp_jobs.push(job);
                    Ok(JobHandle {
                        kind: JobKind::Calculation,
                        label: label.clone(),
                        slot: Some(slot),
                        job_id: Some(self.vasp_jobs.len().to_string()),
                        workdir: PathBuf::from(label),
                    })
                }
                JobRequest::Phonopy(job) => {
                    self.phonopy_jobs.push(*job);
                    Ok(JobHandle {
                        kind: JobKind::Phonopy,
                        label: label.clone(),
                        slot: None,
                        job_id: Some("900".to_string()),
                        workdir: PathBuf::from(label),
                    })
                }
            }
        }

        fn immigrate(&mut self, request: ImmigrantRequest) -> Result<JobHandle> {
            let handle = JobHandle {
                kind: JobKind::Immigrant,
                label: request.slot.label(),
                slot: Some(request.slot),
                job_id: None,
                workdir: request.folder.clone(),
            };
            self.immigrated.push(request);
            Ok(handle)
        }

        fn wait_calculations(&mut self, handles: &[JobHandle]) -> Result<Vec<CalculationRecord>> {
            self.waits += 1;
            handles
                .iter()
                .map(|h| {
                    let slot = h.slot.ok_or_else(|| PhonoflowError::Other("no slot".into()))?;
                    match h.kind {
                        JobKind::Immigrant => {
                            let mut record = self
                                .folder_records
                                .get(&h.workdir)
                                .cloned()
                                .ok_or_else(|| PhonoflowError::DirectoryNotFound {
                                    path: h.workdir.display().to_string(),
                                })?;
                            record.slot = slot;
                            Ok(record)
                        }
                        _ => {
                            let job = self
                                .vasp_jobs
                                .iter()
                                .find(|j| j.slot == slot)
                                .ok_or_else(|| PhonoflowError::Other("unknown job".into()))?;
                            let outputs = match slot {
                                CalcSlot::Supercell(n) if self.missing_forces.contains(&n) => {
                                    CalcOutputs::default()
                                }
                                CalcSlot::Supercell(n) => {
                                    force_outputs(n, job.structure.num_atoms())
                                }
                                CalcSlot::Nac => self.nac_outputs.clone(),
                            };
                            Ok(CalculationRecord::new(
                                slot,
                                RecordOrigin::Submitted {
                                    job_id: h.job_id.clone().unwrap_or_default(),
                                    workdir: h.workdir.clone(),
                                },
                            )
                            .with_structure(job.structure.clone())
                            .with_outputs(outputs))
                        }
                    }
                })
                .collect()
        }

        fn wait_phonopy(&mut self, _handle: &JobHandle) -> Result<PhonopyOutputs> {
            self.phonopy_outputs
                .clone()
                .ok_or_else(|| PhonoflowError::Other("phonopy job failed".into()))
        }

        fn load_record(&self, node_id: &str) -> Result<CalculationRecord> {
            self.stored
                .get(node_id)
                .cloned()
                .ok_or_else(|| PhonoflowError::FileNotFound {
                    path: node_id.to_string(),
                })
        }
    }

    // ─── helpers ─────────────────────────────────────────────────

    fn inputs(extra: &str) -> WorkflowInputs {
        let yaml = format!(
            "structure: POSCAR\nphonon_settings:\n  supercell_matrix: [2, 2, 2]\n{}",
            extra
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    const CALCULATOR: &str = "calculator_settings:\n  forces:\n    kpoints_mesh: [2, 2, 2]\n";

    fn run(
        inputs: WorkflowInputs,
        engine: &mut FakeEngine,
        library: &FakeLibrary,
    ) -> (Result<()>, WorkflowOutputs) {
        let mut workflow = PhononWorkflow::new(inputs, unitcell(), engine, library).unwrap();
        let result = workflow.run();
        (result, workflow.into_outputs())
    }

    fn generated_supercells(library: &FakeLibrary) -> Vec<Crystal> {
        library
            .phonon_setting_info(
                &PhononSettings::new(crate::models::SupercellMatrix::Diagonal([2, 2, 2])),
                &unitcell(),
                1e-5,
                None,
            )
            .unwrap()
            .supercells
    }

    fn stored_record(n: usize, structure: Crystal) -> CalculationRecord {
        CalculationRecord::new(
            CalcSlot::Supercell(99),
            RecordOrigin::Stored {
                node_id: format!("{}", 100 + n),
            },
        )
        .with_outputs(force_outputs(n, structure.num_atoms()))
        .with_structure(structure)
    }

    // ─── tests ───────────────────────────────────────────────────

    #[test]
    fn test_fresh_dry_run_assembles_all_forces() {
        let library = FakeLibrary::new(8);
        let mut engine = FakeEngine::default();

        let (result, outputs) = run(inputs(CALCULATOR), &mut engine, &library);
        result.unwrap();

        assert_eq!(engine.vasp_jobs.len(), 8);
        assert_eq!(engine.waits, 1);
        assert_eq!(engine.vasp_jobs[0].slot.label(), "supercell_001");
        assert_eq!(engine.vasp_jobs[7].slot.label(), "supercell_008");

        let fs = outputs.force_sets.as_ref().unwrap();
        assert_eq!(fs.len(), 8);
        assert!((fs.force_sets[2][0][0] - 0.03).abs() < 1e-12);
        assert_eq!(fs.energies.as_ref().unwrap()[7], -8.0);

        assert_eq!(
            outputs.published(),
            vec!["phonon_setting_info", "primitive", "supercell", "force_sets"]
        );
        assert_eq!(outputs.supercells.len(), 8);
        assert!(!library.called("force_constants"));
    }

    #[test]
    fn test_nac_job_runs_on_primitive_cell() {
        let library = FakeLibrary::new(2);
        let mut engine = FakeEngine {
            nac_outputs: nac_outputs(true, true),
            ..Default::default()
        };
        let mut inputs = inputs(CALCULATOR);
        inputs.phonon_settings.is_nac = true;

        let (result, outputs) = run(inputs, &mut engine, &library);
        result.unwrap();

        assert_eq!(engine.vasp_jobs.len(), 3);
        let nac_job = &engine.vasp_jobs[2];
        assert_eq!(nac_job.slot, CalcSlot::Nac);
        assert_eq!(nac_job.structure, unitcell());
        assert_eq!(engine.waits, 1);

        let nac = outputs.nac_params.unwrap();
        assert_eq!(nac.dielectric[0][0], 9.0);
        assert!(library.nac_primitive.borrow().is_none());
    }

    #[test]
    fn test_missing_forces_stop_the_run() {
        let library = FakeLibrary::new(3);
        let mut engine = FakeEngine {
            missing_forces: vec![2],
            ..Default::default()
        };

        let (result, outputs) = run(inputs(CALCULATOR), &mut engine, &library);
        match result {
            Err(PhonoflowError::ForcesNotRetrieved {
                found,
                expected,
                missing,
            }) => {
                assert_eq!((found, expected), (2, 3));
                assert_eq!(missing, vec![2]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(outputs.phonon_setting_info.is_some());
        assert!(outputs.force_sets.is_none());
    }

    #[test]
    fn test_missing_born_charges() {
        let library = FakeLibrary::new(1);
        let mut engine = FakeEngine {
            nac_outputs: nac_outputs(false, true),
            ..Default::default()
        };
        let mut inputs = inputs(CALCULATOR);
        inputs.phonon_settings.is_nac = true;

        let (result, outputs) = run(inputs, &mut engine, &library);
        assert!(matches!(
            result,
            Err(PhonoflowError::MissingResult { field, .. }) if field == "born_charges"
        ));
        assert!(outputs.force_sets.is_some());
        assert!(outputs.nac_params.is_none());
    }

    #[test]
    fn test_missing_dielectrics() {
        let library = FakeLibrary::new(1);
        let mut engine = FakeEngine {
            nac_outputs: nac_outputs(true, false),
            ..Default::default()
        };
        let mut inputs = inputs(CALCULATOR);
        inputs.phonon_settings.is_nac = true;

        let (result, _) = run(inputs, &mut engine, &library);
        assert!(matches!(
            result,
            Err(PhonoflowError::MissingResult { field, .. }) if field == "dielectrics"
        ));
    }

    #[test]
    fn test_imported_folder_mismatch() {
        let library = FakeLibrary::new(2);
        let supercells = generated_supercells(&library);

        let mut engine = FakeEngine::default();
        engine
            .folder_records
            .insert("disp-001".into(), stored_record(1, supercells[0].clone()));
        // 第二个目录是第一个超胞的结构
        engine
            .folder_records
            .insert("disp-002".into(), stored_record(2, supercells[0].clone()));

        let inputs = inputs("immigrant_calculation_folders:\n  force: [disp-001, disp-002]\n");
        let (result, outputs) = run(inputs, &mut engine, &library);

        assert!(matches!(
            result,
            Err(PhonoflowError::SupercellMismatch { index: 2 })
        ));
        assert_eq!(engine.immigrated.len(), 2);
        assert!(engine.vasp_jobs.is_empty());
        assert!(outputs.force_sets.is_none());
    }

    #[test]
    fn test_imported_folders_with_nac_use_primitive() {
        let library = FakeLibrary::new(2);
        let supercells = generated_supercells(&library);

        let mut engine = FakeEngine::default();
        engine
            .folder_records
            .insert("disp-001".into(), stored_record(1, supercells[0].clone()));
        engine
            .folder_records
            .insert("disp-002".into(), stored_record(2, supercells[1].clone()));
        engine.folder_records.insert(
            "born".into(),
            CalculationRecord::new(
                CalcSlot::Nac,
                RecordOrigin::Stored {
                    node_id: "born".into(),
                },
            )
            .with_structure(unitcell())
            .with_outputs(nac_outputs(true, true)),
        );

        let mut inputs = inputs(
            "immigrant_calculation_folders:\n  force: [disp-001, disp-002]\n  nac: [born]\n",
        );
        inputs.phonon_settings.is_nac = true;

        let (result, outputs) = run(inputs, &mut engine, &library);
        result.unwrap();

        assert!(engine.vasp_jobs.is_empty());
        assert_eq!(engine.immigrated.len(), 3);
        assert_eq!(engine.immigrated[2].slot, CalcSlot::Nac);
        assert_eq!(engine.immigrated[2].folder, PathBuf::from("born"));
        assert_eq!(outputs.force_sets.as_ref().unwrap().len(), 2);
        assert_eq!(library.nac_primitive.borrow().as_ref(), Some(&unitcell()));
        assert_eq!(outputs.nac_params.unwrap().dielectric[0][0], 9.0);
    }

    #[test]
    fn test_imported_records_with_local_phonopy() {
        let library = FakeLibrary::new(2);
        let supercells = generated_supercells(&library);

        let mut engine = FakeEngine::default();
        engine
            .stored
            .insert("101".into(), stored_record(1, supercells[0].clone()));
        engine
            .stored
            .insert("102".into(), stored_record(2, supercells[1].clone()));
        engine.stored.insert(
            "200".into(),
            CalculationRecord::new(
                CalcSlot::Nac,
                RecordOrigin::Stored {
                    node_id: "200".into(),
                },
            )
            .with_structure(unitcell())
            .with_outputs(nac_outputs(true, true)),
        );

        let mut inputs = inputs(
            "calculation_nodes:\n  force: ['101', '102', '103']\n  nac: ['200']\nrun_phonopy: true\n",
        );
        inputs.phonon_settings.is_nac = true;

        let (result, outputs) = run(inputs, &mut engine, &library);
        result.unwrap();

        assert!(engine.vasp_jobs.is_empty());
        assert_eq!(engine.waits, 0);
        assert_eq!(outputs.force_sets.as_ref().unwrap().len(), 2);
        assert_eq!(library.nac_primitive.borrow().as_ref(), Some(&unitcell()));

        assert!(library.called("force_constants"));
        assert!(library.called("phonon_properties"));
        assert!(outputs.force_constants.is_some());
        assert!(outputs.thermal_properties.is_some());
        assert!(outputs.dos.is_some());
        assert!(outputs.band_structure.is_some());
        assert!(outputs.pdos.is_none());
    }

    #[test]
    fn test_remote_outputs_copied_verbatim() {
        let library = FakeLibrary::new(2);
        let mut engine = FakeEngine {
            phonopy_outputs: Some(phonopy_outputs()),
            ..Default::default()
        };
        let inputs = inputs(&format!(
            "{}run_phonopy: true\nremote_phonopy: true\ncode_string: phonopy\noptions:\n  ntasks: 1\n",
            CALCULATOR
        ));

        let (result, outputs) = run(inputs, &mut engine, &library);
        result.unwrap();

        assert_eq!(engine.phonopy_jobs.len(), 1);
        let job = &engine.phonopy_jobs[0];
        assert_eq!(job.code_string, "phonopy");
        assert_eq!(job.force_sets.len(), 2);
        assert!(job.nac_params.is_none());

        let expected = phonopy_outputs();
        assert_eq!(outputs.pdos, Some(expected.pdos));
        assert_eq!(outputs.force_constants, Some(expected.force_constants));
        assert_eq!(outputs.dos, Some(expected.dos));
        assert!(!library.called("force_constants"));
    }

    #[test]
    fn test_dry_run_publishes_no_phonon_properties() {
        let library = FakeLibrary::new(2);
        let mut engine = FakeEngine::default();
        let inputs = inputs(&format!("{}run_phonopy: true\ndry_run: true\n", CALCULATOR));

        let (result, outputs) = run(inputs, &mut engine, &library);
        result.unwrap();

        assert!(outputs.force_sets.is_some());
        assert!(outputs.force_constants.is_none());
        assert!(outputs.thermal_properties.is_none());
        assert!(outputs.dos.is_none());
        assert!(outputs.band_structure.is_none());
        assert!(engine.phonopy_jobs.is_empty());
    }

    #[test]
    fn test_invalid_inputs_fail_before_anything_runs() {
        let library = FakeLibrary::new(2);
        let mut engine = FakeEngine::default();
        let inputs = inputs("run_phonopy: true\nremote_phonopy: true\n");

        assert!(matches!(
            PhononWorkflow::new(inputs, unitcell(), &mut engine, &library),
            Err(PhonoflowError::RemoteConfigIncomplete)
        ));
        assert!(!library.called("phonon_setting_info"));
    }
}
