#[cfg(test)]
pub mod test {
    use std::sync::Arc;

    use crate::convert::{Converter, SymbolTable};
    use crate::definition::RequiredConfig;
    use crate::error::NestfigError;
    use crate::namespace::Namespace;
    use crate::option::ConfigOption;
    use crate::value::{Symbol, Value};

    /// `a=1, b=17, c: {x='fred', y=3.14159, z=99}`
    pub fn simple_tree() -> Namespace {
        let mut tree = Namespace::new();
        tree.add_option(ConfigOption::builder("a").default(1).doc("the a"))
            .unwrap();
        tree.add_option(ConfigOption::builder("b").default(17).doc("the b"))
            .unwrap();
        let c = tree.add_namespace("c", Namespace::with_doc("c space")).unwrap();
        c.add_option(ConfigOption::builder("x").default("fred").doc("the x"))
            .unwrap();
        c.add_option(ConfigOption::builder("y").default(3.14159).doc("the y"))
            .unwrap();
        c.add_option(ConfigOption::builder("z").default(99).doc("the z"))
            .unwrap();
        tree
    }

    /// `aaa`, `c: {fred, wilma}`, `d: {fred, ethel, x: {size, password}}`
    pub fn flintstones() -> Namespace {
        let mut tree = Namespace::new();
        tree.add_option(
            ConfigOption::builder("aaa")
                .default("2011-05-04T15:10:00")
                .converter(Converter::datetime())
                .doc("the a"),
        )
        .unwrap();

        let c = tree.add_namespace("c", Namespace::with_doc("c space")).unwrap();
        c.add_option(
            ConfigOption::builder("fred")
                .default("stupid")
                .doc("husband from Flintstones"),
        )
        .unwrap();
        c.add_option(
            ConfigOption::builder("wilma")
                .default("waspish")
                .doc("wife from Flintstones"),
        )
        .unwrap();

        let d = tree.add_namespace("d", Namespace::with_doc("d space")).unwrap();
        d.add_option(
            ConfigOption::builder("fred")
                .default("crabby")
                .doc("male neighbor from I Love Lucy"),
        )
        .unwrap();
        d.add_option(
            ConfigOption::builder("ethel")
                .default("silly")
                .doc("female neighbor from I Love Lucy"),
        )
        .unwrap();

        let x = d.add_namespace("x", Namespace::new()).unwrap();
        x.add_option(
            ConfigOption::builder("size")
                .default(100)
                .doc("how big in tons")
                .short_form('s'),
        )
        .unwrap();
        x.add_option(
            ConfigOption::builder("password")
                .default("secret")
                .doc("the password"),
        )
        .unwrap();
        tree
    }

    /// A component that declares its own options.
    pub struct Database;

    impl RequiredConfig for Database {
        fn required_config() -> Result<Namespace, NestfigError> {
            let mut ns = Namespace::with_doc("database connection");
            ns.add_option(
                ConfigOption::builder("host")
                    .default("localhost")
                    .doc("the database host"),
            )?;
            ns.add_option(ConfigOption::builder("port").default(5432).doc("the port"))?;
            ns.add_aggregation("url", |_, local, _| {
                let host = local.get("host").map(Value::to_string).unwrap_or_default();
                let port = local.get("port").map(Value::to_string).unwrap_or_default();
                Ok(Value::Str(format!("pg://{host}:{port}")))
            })?;
            Ok(ns)
        }
    }

    /// A file-backed database: just a `path`.
    pub struct Sqlite;

    impl RequiredConfig for Sqlite {
        fn required_config() -> Result<Namespace, NestfigError> {
            let mut ns = Namespace::new();
            ns.add_option(
                ConfigOption::builder("path")
                    .default("app.db")
                    .doc("the database file"),
            )?;
            Ok(ns)
        }
    }

    /// `main.Postgres` declares [`Database`]'s options, `main.Sqlite` a
    /// `path` and a factory, `main.Memory` nothing at all.
    pub fn backends() -> Arc<SymbolTable> {
        let mut table = SymbolTable::new();
        table.insert(Symbol::new("main.Postgres", ()).with_required_config(Database::required_config));
        table.insert(
            Symbol::new("main.Sqlite", ())
                .with_required_config(Sqlite::required_config)
                .with_factory(|local| {
                    let path = local.get("path").map(Value::to_string).unwrap_or_default();
                    Ok(Value::Str(format!("sqlite:{path}")))
                }),
        );
        table.insert(Symbol::new("main.Memory", ()));
        Arc::new(table)
    }

    #[test]
    fn simple_tree_defaults() {
        let tree = simple_tree();
        assert_eq!(tree.value("a"), Some(&Value::Int(1)));
        assert_eq!(tree.value("c.y"), Some(&Value::Float(3.14159)));
    }

    #[test]
    fn flintstones_datetime_default_is_converted() {
        let tree = flintstones();
        let aaa = tree.value("aaa").unwrap();
        assert_eq!(aaa.to_string(), "2011-05-04T15:10:00");
    }
}
