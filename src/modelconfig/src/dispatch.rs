use log::debug;

use crate::error::ConfigError;
use crate::model::{
    AnalysisKind, Constraint, ConstraintKind, ConstraintOp, ConstraintTerm, Equilibrium,
    MapFlavor, MarkerAnalysis, Model, ModelOptions, ModelRange, ModelType, Observed,
    QtDistribution, TraitGenotype, TraitModel,
};
use crate::tokens::{parse_doubles, parse_values, tokenize, TokenGroup, Value};

/// What a directive does once matched. The dispatch table maps names onto
/// these; `ConfigBuilder::apply` holds the actual handler bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    FrequencyFile,
    MapFile,
    PedigreeFile,
    LocusFile,
    BayesRatioFile,
    PplFile,
    CountFile,
    ModFile,
    SurfaceFile,
    NiDetailFile,
    SurfacesPath,

    NonPolynomial,
    Imprinting,
    SexLinked,
    FixedModels,
    DryRun,
    ExtraMods,
    ForceBrFile,

    PolynomialScale,
    LiabilityClasses,
    DiseaseAlleles,
    MaxIterations,

    TraitPositions,
    MarkerAlleleFrequency,
    DiseaseGeneFrequency,
    DPrime,
    Theta,
    Alpha,
    Penetrance,
    Constraint,
    Multipoint,
    MarkerToMarker,
    SexSpecific,
    Ld,
    Qt,
    Qtt,
    Mean,
    DegreesOfFreedom,
    StandardDev,
    Threshold,
    Truncate,
    PhenoCodes,

    Noop,
}

/// Sorted (case-insensitively) so prefix lookup can binary search.
/// A unit test below guards the ordering.
static DISPATCH: &[(&str, Action)] = &[
    ("Alpha", Action::Alpha),
    ("BayesRatioFile", Action::BayesRatioFile),
    ("Constraint", Action::Constraint),
    ("CountFile", Action::CountFile),
    ("DegreesOfFreedom", Action::DegreesOfFreedom),
    ("DiseaseAlleles", Action::DiseaseAlleles),
    ("DiseaseGeneFrequency", Action::DiseaseGeneFrequency),
    ("DPrime", Action::DPrime),
    ("DryRun", Action::DryRun),
    ("ExtraMODs", Action::ExtraMods),
    ("FixedModels", Action::FixedModels),
    ("ForceBRFile", Action::ForceBrFile),
    ("FrequencyFile", Action::FrequencyFile),
    ("Imprinting", Action::Imprinting),
    ("LD", Action::Ld),
    ("LiabilityClasses", Action::LiabilityClasses),
    ("LocusFile", Action::LocusFile),
    ("MapFile", Action::MapFile),
    ("MarkerAlleleFrequency", Action::MarkerAlleleFrequency),
    ("MarkerToMarker", Action::MarkerToMarker),
    ("MaxIterations", Action::MaxIterations),
    ("Mean", Action::Mean),
    ("MODFile", Action::ModFile),
    ("Multipoint", Action::Multipoint),
    ("NIDetailFile", Action::NiDetailFile),
    ("NonPolynomial", Action::NonPolynomial),
    ("PedigreeFile", Action::PedigreeFile),
    ("Penetrance", Action::Penetrance),
    ("PhenoCodes", Action::PhenoCodes),
    ("PolynomialScale", Action::PolynomialScale),
    ("PPLFile", Action::PplFile),
    ("QT", Action::Qt),
    ("QTT", Action::Qtt),
    ("SexLinked", Action::SexLinked),
    ("SexSpecific", Action::SexSpecific),
    ("SkipAnalysis", Action::Noop),
    ("SkipEstimation", Action::Noop),
    ("SkipPedCount", Action::Noop),
    ("StandardDev", Action::StandardDev),
    ("SurfaceFile", Action::SurfaceFile),
    ("SurfacesPath", Action::SurfacesPath),
    ("Theta", Action::Theta),
    ("Threshold", Action::Threshold),
    ("TraitPositions", Action::TraitPositions),
    ("Truncate", Action::Truncate),
];

#[derive(Debug, PartialEq, Eq)]
enum Lookup {
    Found(Action),
    Unknown,
    Ambiguous,
}

/// Case-insensitive unambiguous-prefix match against the sorted table.
/// An exact name always wins, so `QT` is not shadowed by `QTT`.
fn lookup(query: &str) -> Lookup {
    let query_lower = query.to_ascii_lowercase();
    let start = DISPATCH.partition_point(|(key, _)| key.to_ascii_lowercase() < query_lower);
    let mut found = None;
    for (key, action) in &DISPATCH[start..] {
        let key_lower = key.to_ascii_lowercase();
        if !key_lower.starts_with(&query_lower) {
            break;
        }
        if key_lower == query_lower {
            return Lookup::Found(*action);
        }
        if found.is_some() {
            return Lookup::Ambiguous;
        }
        found = Some(*action);
    }
    match found {
        Some(action) => Lookup::Found(action),
        None => Lookup::Unknown,
    }
}

/// Accumulates directives into the three option structs, then validates
/// the whole and fills defaults.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    pub(crate) options: ModelOptions,
    pub(crate) range: ModelRange,
    pub(crate) model_type: ModelType,
    pub(crate) observed: Observed,
}

impl ConfigBuilder {
    pub fn new() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Feed a block of configuration text through the dispatch table.
    /// Directive-level faults (unknown names, malformed arguments) abort
    /// immediately; compatibility faults wait for `finish`.
    pub fn parse_text(&mut self, text: &str) -> Result<(), ConfigError> {
        for group in tokenize(text) {
            match lookup(&group.tokens[0]) {
                Lookup::Found(action) => self.apply(action, &group)?,
                Lookup::Unknown => {
                    return Err(ConfigError::UnknownDirective {
                        directive: group.tokens[0].clone(),
                        line: group.line,
                    })
                }
                Lookup::Ambiguous => {
                    return Err(ConfigError::AmbiguousDirective {
                        directive: group.tokens[0].clone(),
                        line: group.line,
                    })
                }
            }
        }
        Ok(())
    }

    pub fn parse_file(&mut self, path: &std::path::Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path)?;
        self.parse_text(&text)
    }

    /// Marshall command-line arguments into directive groups: each `--Name`
    /// opens a group and everything up to the next `--` belongs to it.
    pub fn parse_args(&mut self, args: &[String]) -> Result<(), ConfigError> {
        let mut line = String::new();
        for arg in args {
            match arg.strip_prefix("--") {
                Some(directive) => {
                    if !line.is_empty() {
                        line.push('\n');
                    }
                    line.push_str(directive);
                }
                None if line.is_empty() => {
                    return Err(ConfigError::UnknownDirective { directive: arg.clone(), line: 0 })
                }
                None => {
                    line.push(' ');
                    line.push_str(arg);
                }
            }
        }
        self.parse_text(&line)
    }

    /// Validate the compatibility lattice and fill canonical defaults,
    /// yielding the analysis model.
    pub fn finish(mut self) -> Result<Model, ConfigError> {
        crate::validate::validate(&self)?;
        crate::defaults::fill_defaults(&mut self);
        crate::defaults::sort_and_dedup(&mut self.range);
        Ok(Model { options: self.options, range: self.range, model_type: self.model_type })
    }

    // ---- Handlers --------------------------------------------------------

    fn apply(&mut self, action: Action, group: &TokenGroup) -> Result<(), ConfigError> {
        let name = group.tokens[0].as_str();
        let args = &group.tokens[1..];
        match action {
            Action::FrequencyFile => self.options.frequency_file = one_arg(name, args)?,
            Action::MapFile => self.options.map_file = one_arg(name, args)?,
            Action::PedigreeFile => self.options.pedigree_file = one_arg(name, args)?,
            Action::LocusFile => self.options.locus_file = one_arg(name, args)?,
            Action::BayesRatioFile => self.options.bayes_ratio_file = one_arg(name, args)?,
            Action::PplFile => self.options.ppl_file = one_arg(name, args)?,
            Action::CountFile => self.options.count_file = one_arg(name, args)?,
            Action::ModFile => self.options.mod_file = one_arg(name, args)?,
            Action::SurfaceFile => self.options.surface_file = one_arg(name, args)?,
            Action::NiDetailFile => self.options.ni_detail_file = one_arg(name, args)?,
            Action::SurfacesPath => self.options.surfaces_path = one_arg(name, args)?,

            Action::NonPolynomial => {
                no_args(name, args)?;
                self.options.polynomial = false;
            }
            Action::Imprinting => {
                no_args(name, args)?;
                self.options.imprinting = true;
            }
            Action::SexLinked => {
                no_args(name, args)?;
                self.options.sex_linked = true;
            }
            Action::FixedModels => {
                no_args(name, args)?;
                self.options.integration = false;
            }
            Action::DryRun => {
                no_args(name, args)?;
                self.options.dry_run = true;
            }
            Action::ExtraMods => {
                no_args(name, args)?;
                self.options.extra_mods = true;
            }
            Action::ForceBrFile => {
                no_args(name, args)?;
                self.options.force_br_file = true;
            }

            Action::PolynomialScale => self.options.polynomial_scale = int_arg(name, args)?,
            Action::LiabilityClasses => self.range.liability_classes = int_arg(name, args)?,
            Action::DiseaseAlleles => self.range.disease_alleles = int_arg(name, args)?,
            Action::MaxIterations => self.options.max_iterations = int_arg(name, args)?,

            Action::TraitPositions => {
                for value in parse_values(name, args)? {
                    match value {
                        Value::Marker => self.range.trait_positions_at_markers = true,
                        Value::OpenRange { start, step } => {
                            self.range.trait_position_sweep = Some((start, step));
                        }
                        _ => value.expand_into(&mut self.range.trait_positions),
                    }
                }
                self.observed.trait_positions = true;
            }
            Action::MarkerAlleleFrequency => {
                self.range.marker_allele_freqs.extend(parse_doubles(name, args)?);
            }
            Action::DiseaseGeneFrequency => {
                self.range.gene_freqs.extend(parse_doubles(name, args)?);
            }
            Action::DPrime => self.range.dprimes.extend(parse_doubles(name, args)?),
            Action::Theta => self.range.thetas[0].extend(parse_doubles(name, args)?),
            Action::Alpha => self.range.alphas.extend(parse_doubles(name, args)?),

            Action::Penetrance => {
                // penetrance is always attached to a trait genotype
                let (genotype, rest) = split_genotype(args);
                let genotype = genotype.ok_or_else(|| ConfigError::IllegalArgument {
                    directive: name.to_owned(),
                    arg: args.first().cloned().unwrap_or_default(),
                })?;
                for v in parse_doubles(name, rest)? {
                    self.range.penetrance.push(Some(genotype), v);
                }
            }
            Action::Mean => self.qt_parameter(name, args, |r| &mut r.mean)?,
            Action::StandardDev => self.qt_parameter(name, args, |r| &mut r.standard_dev)?,
            Action::DegreesOfFreedom => {
                self.qt_parameter(name, args, |r| &mut r.degrees_of_freedom)?;
            }
            Action::Threshold => self.range.thresholds.extend(parse_doubles(name, args)?),

            Action::Truncate => {
                let bounds = parse_doubles(name, args)?;
                if bounds.len() != 2 {
                    return Err(ConfigError::IllegalArgument {
                        directive: name.to_owned(),
                        arg: "expected a minimum and a maximum".to_owned(),
                    });
                }
                self.model_type.truncate_min = bounds[0];
                self.model_type.truncate_max = bounds[1];
            }
            Action::PhenoCodes => {
                let codes = parse_doubles(name, args)?;
                match codes.len() {
                    1 => self.options.pheno_codes[0] = Some(codes[0]),
                    3 => {
                        self.options.pheno_codes = [Some(codes[0]), Some(codes[1]), Some(codes[2])];
                    }
                    _ => {
                        return Err(ConfigError::IllegalArgument {
                            directive: name.to_owned(),
                            arg: "expected one or three codes".to_owned(),
                        })
                    }
                }
                self.observed.pheno_code_count = codes.len();
            }

            Action::Multipoint => {
                let markers: usize = int_arg(name, args)?;
                self.model_type.kind = AnalysisKind::Multipoint { markers };
            }
            Action::MarkerToMarker => {
                let which = one_arg(name, args)?;
                self.options.marker_analysis = if which.eq_ignore_ascii_case("all") {
                    MarkerAnalysis::All
                } else if which.eq_ignore_ascii_case("adjacent") {
                    MarkerAnalysis::Adjacent
                } else {
                    return Err(ConfigError::IllegalArgument {
                        directive: name.to_owned(),
                        arg: which,
                    });
                };
            }
            Action::SexSpecific => {
                no_args(name, args)?;
                self.options.map_flavor = MapFlavor::SexSpecific;
            }
            Action::Ld => {
                no_args(name, args)?;
                self.options.equilibrium = Equilibrium::Disequilibrium;
            }
            Action::Qt | Action::Qtt => {
                let distribution = one_arg(name, args)?;
                self.model_type.distribution = if distribution.eq_ignore_ascii_case("normal") {
                    Some(QtDistribution::Normal)
                } else if distribution.eq_ignore_ascii_case("chisq") {
                    Some(QtDistribution::ChiSq)
                } else {
                    return Err(ConfigError::IllegalArgument {
                        directive: name.to_owned(),
                        arg: distribution,
                    });
                };
                self.model_type.trait_model = if action == Action::Qt {
                    TraitModel::Quantitative
                } else {
                    TraitModel::Combined
                };
            }
            Action::Constraint => self.parse_constraint(name, args)?,

            Action::Noop => debug!("directive '{name}' accepted and ignored"),
        }
        Ok(())
    }

    /// Mean / StandardDev / DegreesOfFreedom accept an optional leading
    /// trait genotype; bare values are dynamic-integration brackets.
    fn qt_parameter(
        &mut self,
        name: &str,
        args: &[String],
        select: fn(&mut ModelRange) -> &mut crate::model::GenotypeValues,
    ) -> Result<(), ConfigError> {
        let (genotype, rest) = split_genotype(args);
        let values = parse_doubles(name, rest)?;
        let target = select(&mut self.range);
        for v in values {
            target.push(genotype, v);
        }
        Ok(())
    }

    /// `Constraint <Param> <Geno> [class] <op> <Geno> [class]`
    fn parse_constraint(&mut self, name: &str, args: &[String]) -> Result<(), ConfigError> {
        let illegal = |arg: &str| ConfigError::IllegalArgument {
            directive: name.to_owned(),
            arg: arg.to_owned(),
        };
        let mut cursor = args.iter();
        let param = cursor.next().ok_or_else(|| ConfigError::MissingArgument(name.to_owned()))?;
        let kind = if "Penetrance".to_ascii_lowercase().starts_with(&param.to_ascii_lowercase()) {
            ConstraintKind::Penetrance
        } else if "Mean".to_ascii_lowercase().starts_with(&param.to_ascii_lowercase()) {
            ConstraintKind::Mean
        } else if "StandardDev".to_ascii_lowercase().starts_with(&param.to_ascii_lowercase()) {
            ConstraintKind::StandardDev
        } else if "DegreesOfFreedom"
            .to_ascii_lowercase()
            .starts_with(&param.to_ascii_lowercase())
        {
            ConstraintKind::DegreesOfFreedom
        } else {
            return Err(illegal(param));
        };

        let rest: Vec<&String> = cursor.collect();
        let mut at = 0;
        let mut term = |at: &mut usize| -> Result<ConstraintTerm, ConfigError> {
            let token = rest.get(*at).ok_or_else(|| ConfigError::MissingArgument(name.to_owned()))?;
            let genotype = TraitGenotype::parse(token).ok_or_else(|| illegal(token))?;
            *at += 1;
            let class = match rest.get(*at).and_then(|t| t.parse::<usize>().ok()) {
                Some(class) => {
                    *at += 1;
                    Some(class)
                }
                None => None,
            };
            Ok(ConstraintTerm { genotype, class })
        };

        let left = term(&mut at)?;
        let op_token = rest.get(at).ok_or_else(|| ConfigError::MissingArgument(name.to_owned()))?;
        let op = ConstraintOp::parse(op_token).ok_or_else(|| illegal(op_token))?;
        at += 1;
        let right = term(&mut at)?;
        if at != rest.len() {
            return Err(ConfigError::ExtraArguments(name.to_owned()));
        }

        for class in [left.class, right.class].into_iter().flatten() {
            self.observed.max_constraint_class = self.observed.max_constraint_class.max(class);
        }
        self.observed.constraints = true;
        self.range.constraints.push(Constraint { kind, left, op, right });
        Ok(())
    }
}

fn one_arg(name: &str, args: &[String]) -> Result<String, ConfigError> {
    match args {
        [] => Err(ConfigError::MissingArgument(name.to_owned())),
        [arg] => Ok(arg.clone()),
        _ => Err(ConfigError::ExtraArguments(name.to_owned())),
    }
}

fn no_args(name: &str, args: &[String]) -> Result<(), ConfigError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ExtraArguments(name.to_owned()))
    }
}

fn int_arg<T: std::str::FromStr>(name: &str, args: &[String]) -> Result<T, ConfigError> {
    let raw = one_arg(name, args)?;
    raw.parse().map_err(|_| ConfigError::IllegalArgument {
        directive: name.to_owned(),
        arg: raw,
    })
}

fn split_genotype(args: &[String]) -> (Option<TraitGenotype>, &[String]) {
    match args.first().and_then(|t| TraitGenotype::parse(t)) {
        Some(genotype) => (Some(genotype), &args[1..]),
        None => (None, args),
    }
}
