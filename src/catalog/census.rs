//! Built-in registry for the 2010 and 2022 demographic censuses.

use crate::catalog::{
    AGE_BRACKETS, AgeLayout, ArchiveNaming, ArchiveResource, Encoding, ID_COLUMN, Layout, RACES,
    RaceLayout, Strategy, Theme, ThemeSpec, Under15, race_column,
};

const WAREHOUSE_BASIC_2010: &str = "basedosdados.br_ibge_censo_demografico.setor_censitario_basico_2010";
const WAREHOUSE_AGE_2010: &str = "basedosdados.br_ibge_censo_demografico.setor_censitario_idade_total_2010";
const WAREHOUSE_RACE_2010: &str = "basedosdados.br_ibge_censo_demografico.setor_censitario_raca_idade_genero_2010";
const WAREHOUSE_SECTOR_2022: &str = "basedosdados.br_ibge_censo_2022.populacao_domicilios";

/// 2010 per-state archives live here as `<STEM>_YYYYMMDD.zip`.
const ARCHIVE_DIR_2010: &str = "https://ftp.ibge.gov.br/Censos/Censo_Demografico_2010/\
    Resultados_do_Universo/Agregados_por_Setores_Censitarios/";

const ARCHIVE_ROOT_2022: &str = "https://ftp.ibge.gov.br/Censos/Censo_Demografico_2022/\
    Agregados_por_Setores_Censitarios/Agregados_por_Setor_csv/";

const ARCHIVE_INCOME_2022: &str = "https://ftp.ibge.gov.br/Censos/Censo_Demografico_2022/\
    Agregados_por_Setores_Censitarios_Rendimento_do_Responsavel/\
    Agregados_por_setores_renda_responsavel_BR_csv.zip";

/// Generates a sequence of column names, e.g. `cols("v", 35, 49, 3)` = v035..v048.
fn cols(prefix: &str, start: u32, end: u32, width: usize) -> Vec<String> {
    (start..end).map(|i| format!("{prefix}{i:0width$}")).collect()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn renames(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.iter().map(|(raw, canonical)| (raw.to_string(), canonical.to_string())).collect()
}

fn race_names() -> Vec<String> {
    RACES.iter().map(|race| race_column(race)).collect()
}

fn age_names() -> Vec<String> {
    names(&AGE_BRACKETS)
}

fn archive_2010(glob: &str) -> ArchiveResource {
    ArchiveResource::new(format!("{ARCHIVE_DIR_2010}{{stem}}.zip"), ArchiveNaming::Dated, glob)
}

fn archive_2022(url: impl Into<String>, glob: &str) -> ArchiveResource {
    ArchiveResource::new(url, ArchiveNaming::Fixed, glob)
        .with_id_col("CD_SETOR")
        .with_encoding(Encoding::Latin1)
}

/// 2010 age layout over the lower-case `v###` columns.
fn age_layout_2010() -> AgeLayout {
    let mut under_15 = vec!["v022".to_string()];
    under_15.extend(cols("v", 35, 49, 3));
    AgeLayout {
        under_15: Under15::Sum(under_15),
        from_15_to_19: cols("v", 49, 54, 3),
        from_20_to_64: cols("v", 54, 99, 3),
        from_65: cols("v", 99, 135, 3),
    }
}

fn age_columns_2010() -> Vec<String> {
    let mut raw = vec!["v022".to_string()];
    raw.extend(cols("v", 35, 135, 3));
    raw
}

fn census_2010() -> Vec<ThemeSpec> {
    let race_map = [("v002", "cor_branca"), ("v003", "cor_preta"), ("v004", "cor_amarela"), ("v005", "cor_parda"), ("v006", "cor_indigena")];
    let race_map_upper = [("V002", "cor_branca"), ("V003", "cor_preta"), ("V004", "cor_amarela"), ("V005", "cor_parda"), ("V006", "cor_indigena")];

    let mut specs = Vec::new();

    // warehouse
    specs.push(ThemeSpec {
        table_id: Some(WAREHOUSE_BASIC_2010.into()),
        required_columns: names(&["v001", "v002"]),
        column_map: renames(&[("v001", "domicilios"), ("v002", "habitantes")]),
        extensive_vars: names(&["domicilios", "habitantes"]),
        ..ThemeSpec::new(Theme::Basic, 2010, Strategy::Warehouse)
    });
    specs.push(ThemeSpec {
        table_id: Some(WAREHOUSE_BASIC_2010.into()),
        required_columns: names(&["v005"]),
        column_map: renames(&[("v005", "rendimento_medio")]),
        intensive_vars: names(&["rendimento_medio"]),
        ..ThemeSpec::new(Theme::Income, 2010, Strategy::Warehouse)
    });
    specs.push(ThemeSpec {
        table_id: Some(WAREHOUSE_AGE_2010.into()),
        required_columns: age_columns_2010(),
        extensive_vars: age_names(),
        layout: Layout::AgeBrackets(age_layout_2010()),
        ..ThemeSpec::new(Theme::Age, 2010, Strategy::Warehouse)
    });
    specs.push(ThemeSpec {
        table_id: Some(WAREHOUSE_RACE_2010.into()),
        required_columns: names(&["v002", "v003", "v004", "v005", "v006"]),
        column_map: renames(&race_map),
        extensive_vars: race_names(),
        ..ThemeSpec::new(Theme::Race, 2010, Strategy::Warehouse)
    });

    // archive
    specs.push(ThemeSpec {
        resources: vec![archive_2010("Basico_*.csv")],
        column_map: renames(&[("Cod_setor", ID_COLUMN), ("V001", "domicilios"), ("V002", "habitantes")]),
        extensive_vars: names(&["domicilios", "habitantes"]),
        ..ThemeSpec::new(Theme::Basic, 2010, Strategy::Archive)
    });
    specs.push(ThemeSpec {
        resources: vec![archive_2010("Basico_*.csv")],
        column_map: renames(&[("Cod_setor", ID_COLUMN), ("V005", "rendimento_medio")]),
        intensive_vars: names(&["rendimento_medio"]),
        ..ThemeSpec::new(Theme::Income, 2010, Strategy::Archive)
    });
    specs.push(ThemeSpec {
        resources: vec![archive_2010("Pessoa03_*.csv")],
        column_map: {
            let mut map = renames(&[("Cod_setor", ID_COLUMN)]);
            map.extend(renames(&race_map_upper));
            map
        },
        extensive_vars: race_names(),
        ..ThemeSpec::new(Theme::Race, 2010, Strategy::Archive)
    });
    specs.push(ThemeSpec {
        resources: vec![archive_2010("Pessoa11_*.csv")],
        required_columns: {
            let mut raw = vec!["V022".to_string()];
            raw.extend(cols("V", 35, 135, 3));
            raw
        },
        column_map: {
            let mut map = renames(&[("Cod_setor", ID_COLUMN), ("V022", "v022")]);
            map.extend((35..135).map(|i| (format!("V{i:03}"), format!("v{i:03}"))));
            map
        },
        extensive_vars: age_names(),
        layout: Layout::AgeBrackets(age_layout_2010()),
        ..ThemeSpec::new(Theme::Age, 2010, Strategy::Archive)
    });

    specs
}

fn census_2022() -> Vec<ThemeSpec> {
    let mut specs = Vec::new();

    // warehouse
    specs.push(ThemeSpec {
        table_id: Some(WAREHOUSE_SECTOR_2022.into()),
        required_columns: names(&["domicilios", "pessoas"]),
        column_map: renames(&[("pessoas", "habitantes"), ("domicilios", "total_domicilios")]),
        extensive_vars: names(&["habitantes", "total_domicilios"]),
        ..ThemeSpec::new(Theme::Basic, 2022, Strategy::Warehouse)
    });
    specs.push(ThemeSpec {
        table_id: Some(WAREHOUSE_SECTOR_2022.into()),
        required_columns: {
            let mut raw = vec!["pessoas".to_string()];
            raw.extend(cols("V", 644, 657, 5));
            raw
        },
        extensive_vars: age_names(),
        layout: Layout::AgeBrackets(AgeLayout {
            under_15: Under15::Residual { total: "pessoas".into() },
            from_15_to_19: names(&["V00644"]),
            from_20_to_64: cols("V", 645, 654, 5),
            from_65: cols("V", 654, 657, 5),
        }),
        ..ThemeSpec::new(Theme::Age, 2022, Strategy::Warehouse)
    });
    specs.push(ThemeSpec {
        table_id: Some(WAREHOUSE_SECTOR_2022.into()),
        required_columns: {
            let mut raw = vec!["pessoas".to_string()];
            raw.extend(cols("V", 644, 717, 5));
            raw
        },
        extensive_vars: race_names(),
        layout: Layout::RaceImputation(RaceLayout {
            total: "pessoas".into(),
            adults: cols("V", 644, 657, 5),
            // 15+ race columns are interleaved: race i starts at 657 + i, step 5
            by_race: std::array::from_fn(|i| {
                (657 + i as u32..717).step_by(5).map(|c| format!("V{c:05}")).collect()
            }),
        }),
        ..ThemeSpec::new(Theme::Race, 2022, Strategy::Warehouse)
    });

    // archive
    specs.push(ThemeSpec {
        resources: vec![archive_2022(format!("{ARCHIVE_ROOT_2022}Agregados_por_setores_basico_BR_20250417.zip"), "*.csv")],
        column_map: renames(&[
            ("CD_SETOR", ID_COLUMN),
            ("v0001", "habitantes"),
            ("v0002", "total_domicilios"),
            ("v0003", "domicilios_particulares"),
            ("v0004", "domicilios_coletivos"),
            ("v0005", "media_moradores_dom_ocupados"),
            ("v0006", "pct_domicilios_imputados"),
            ("v0007", "domicilios_particulares_ocupados"),
        ]),
        extensive_vars: names(&[
            "habitantes", "total_domicilios", "domicilios_particulares",
            "domicilios_coletivos", "domicilios_particulares_ocupados",
        ]),
        intensive_vars: names(&["media_moradores_dom_ocupados", "pct_domicilios_imputados"]),
        ..ThemeSpec::new(Theme::Basic, 2022, Strategy::Archive)
    });
    specs.push(ThemeSpec {
        resources: vec![archive_2022(ARCHIVE_INCOME_2022, "*.csv")],
        column_map: renames(&[("CD_SETOR", ID_COLUMN), ("V06004", "rendimento_medio")]),
        intensive_vars: names(&["rendimento_medio"]),
        ..ThemeSpec::new(Theme::Income, 2022, Strategy::Archive)
    });
    specs.push(ThemeSpec {
        resources: vec![archive_2022(format!("{ARCHIVE_ROOT_2022}Agregados_por_setores_cor_ou_raca_BR.zip"), "*.csv")],
        column_map: renames(&[
            ("CD_SETOR", ID_COLUMN),
            ("V01317", "cor_branca"),
            ("V01318", "cor_preta"),
            ("V01319", "cor_amarela"),
            ("V01320", "cor_parda"),
            ("V01321", "cor_indigena"),
        ]),
        extensive_vars: race_names(),
        ..ThemeSpec::new(Theme::Race, 2022, Strategy::Archive)
    });
    // Literacy table; V00748 (literate persons) is excluded to avoid double counting.
    let literacy_age = names(&["V00644", "V00649", "V00654", "V00659", "V00664", "V00669", "V00674", "V00679"]);
    specs.push(ThemeSpec {
        resources: vec![archive_2022(
            format!("{ARCHIVE_ROOT_2022}Agregados_por_setores_alfabetizacao_BR.zip"),
            "Agregados_por_setores_alfabetizacao_BR.csv",
        )],
        required_columns: literacy_age.clone(),
        column_map: renames(&[("CD_SETOR", ID_COLUMN)]),
        extensive_vars: literacy_age,
        ..ThemeSpec::new(Theme::Age, 2022, Strategy::Archive)
    });

    specs
}

/// Every built-in census contract.
pub(crate) fn census_specs() -> Vec<ThemeSpec> {
    let mut specs = census_2010();
    specs.extend(census_2022());
    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_2010_brackets_cover_v022_and_v035_to_v134() {
        let layout = age_layout_2010();
        let Under15::Sum(under_15) = &layout.under_15 else { panic!("2010 has no sector total") };
        assert_eq!(under_15.first().map(String::as_str), Some("v022"));
        assert_eq!(under_15.last().map(String::as_str), Some("v048"));
        assert_eq!(layout.from_15_to_19, names(&["v049", "v050", "v051", "v052", "v053"]));
        assert_eq!(layout.from_20_to_64.len(), 45);
        assert_eq!(layout.from_65.last().map(String::as_str), Some("v134"));
    }

    #[test]
    fn race_2022_columns_interleave_by_five() {
        let spec = census_2022().into_iter()
            .find(|s| s.theme == Theme::Race && s.strategy == Strategy::Warehouse)
            .unwrap();
        let Layout::RaceImputation(layout) = &spec.layout else { panic!("missing race layout") };

        assert_eq!(layout.by_race[0][..3], names(&["V00657", "V00662", "V00667"]));
        assert_eq!(layout.by_race[4].first().map(String::as_str), Some("V00661"));
        assert_eq!(layout.by_race[4].last().map(String::as_str), Some("V00716"));
        assert!(layout.by_race.iter().all(|cols| cols.len() == 12));
        assert_eq!(layout.adults.len(), 13);
    }
}
